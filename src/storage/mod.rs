//! Storage layout for uploaded originals and their tile trees.
//!
//! Nothing about an image is kept in a database; an image "record" is the
//! pair of directories below, keyed by its [`ImageId`]:
//!
//! ```text
//! data/
//! ├── uploads/<id>/original.<ext>
//! └── tiles/<id>/
//!     ├── <id>.dzi                        (manifest, written last)
//!     └── <id>_files/<level>/<x>_<y>.png  (tile pyramid)
//! ```

mod id;
mod layout;

pub use id::ImageId;
pub use layout::{FileEntry, ImageSize, StorageLayout};
