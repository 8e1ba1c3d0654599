use kuchiki::NodeRef;

use super::EmbedError;
use crate::config::Placement;

/// Checks that `placement` is possible relative to `placeholder` without
/// touching the tree.
pub(crate) fn check_placement(placeholder: &NodeRef, placement: Placement) -> Result<(), EmbedError> {
    match placement {
        Placement::Before | Placement::After | Placement::Replace
            if placeholder.parent().is_none() =>
        {
            Err(EmbedError::DetachedPlaceholder)
        }
        _ => Ok(()),
    }
}

/// Inserts `frame` relative to `placeholder`. `Replace` removes the
/// placeholder.
pub(crate) fn insert_frame(frame: &NodeRef, placeholder: &NodeRef, placement: Placement) {
    match placement {
        Placement::Start => placeholder.prepend(frame.clone()),
        Placement::End => placeholder.append(frame.clone()),
        Placement::Before => placeholder.insert_before(frame.clone()),
        Placement::After => placeholder.insert_after(frame.clone()),
        Placement::Replace => {
            placeholder.insert_before(frame.clone());
            placeholder.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchiki::traits::*;

    fn layout(placement: Placement) -> String {
        let document = kuchiki::parse_html()
            .one("<html><body><div id=\"p\"><span></span></div></body></html>");
        let placeholder = document.select_first("#p").unwrap().as_node().clone();
        let frame = kuchiki::parse_html()
            .one("<html><body><iframe></iframe></body></html>")
            .select_first("iframe")
            .unwrap()
            .as_node()
            .clone();
        frame.detach();

        check_placement(&placeholder, placement).unwrap();
        insert_frame(&frame, &placeholder, placement);
        document.select_first("body").unwrap().as_node().to_string()
    }

    #[test]
    fn places_relative_to_placeholder() {
        assert_eq!(
            layout(Placement::Start),
            "<body><div id=\"p\"><iframe></iframe><span></span></div></body>"
        );
        assert_eq!(
            layout(Placement::End),
            "<body><div id=\"p\"><span></span><iframe></iframe></div></body>"
        );
        assert_eq!(
            layout(Placement::Before),
            "<body><iframe></iframe><div id=\"p\"><span></span></div></body>"
        );
        assert_eq!(
            layout(Placement::After),
            "<body><div id=\"p\"><span></span></div><iframe></iframe></body>"
        );
        assert_eq!(layout(Placement::Replace), "<body><iframe></iframe></body>");
    }

    #[test]
    fn sibling_placements_need_a_parent() {
        let detached = NodeRef::new_text("orphan");
        assert!(matches!(
            check_placement(&detached, Placement::Replace),
            Err(EmbedError::DetachedPlaceholder)
        ));
        assert!(check_placement(&detached, Placement::End).is_ok());
    }
}
