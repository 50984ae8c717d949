//! Mount API - attach rendered content to a live parent.
//!
//! # Example
//!
//! ```ignore
//! use spark_html::{html, mount_to_body, signal};
//!
//! let count = signal(0);
//! let handle = mount_to_body(html!("<p>Count: " {count.clone()} "</p>"));
//!
//! count.set(1); // the paragraph updates in place
//!
//! handle.unmount();
//! ```

use tracing::debug;

use crate::dom::{self, Node};
use crate::signals::untracked;

use super::bind::render_value;
use super::value::IntoValue;

// =============================================================================
// Mount Handle
// =============================================================================

/// Handle returned by [`mount`]. Dropping it leaves the content in place.
#[derive(Debug)]
pub struct MountHandle {
    nodes: Vec<Node>,
}

impl MountHandle {
    /// Top-level nodes as rendered at mount time.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Remove the mounted content.
    ///
    /// Everything between the first and last mounted node goes, so nodes a
    /// live range inserted since mount are removed as well.
    pub fn unmount(self) {
        let (Some(first), Some(last)) = (self.nodes.first(), self.nodes.last()) else {
            return;
        };

        let mut doomed = Vec::new();
        if first.parent().is_some() && first.parent() == last.parent() {
            let mut cursor = Some(first.clone());
            while let Some(node) = cursor {
                cursor = node.next_sibling();
                let done = node == *last;
                doomed.push(node);
                if done {
                    break;
                }
            }
        }
        doomed.extend(self.nodes.iter().filter(|n| n.parent().is_some()).cloned());

        for node in &doomed {
            node.remove();
        }
        debug!(nodes = doomed.len(), "unmounted");
    }
}

// =============================================================================
// Mount
// =============================================================================

/// Render `content` and append it to `parent`.
///
/// Content mounts as soon as `parent` is connected; bindings inside it go
/// live at that point.
pub fn mount(parent: &Node, content: impl IntoValue) -> MountHandle {
    let mut nodes = Vec::new();
    untracked(|| render_value(content.into_value(), &mut nodes));
    for node in &nodes {
        parent.append_child(node);
    }
    debug!(nodes = nodes.len(), connected = parent.is_connected(), "mounted");
    MountHandle { nodes }
}

/// [`mount`] into the live document's `<body>`.
pub fn mount_to_body(content: impl IntoValue) -> MountHandle {
    mount(&dom::body(), content)
}
