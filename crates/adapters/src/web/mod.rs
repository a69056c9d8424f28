//! Web adapters: link reachability and Open Graph link cards

mod link_check;
mod preview;

pub use link_check::HttpLinkChecker;
pub use preview::{MAX_THUMB_BYTES, OpenGraphPreviewer};
