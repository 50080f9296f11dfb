//! Mount layer: incremental reconciliation of render trees against live,
//! UI-confined content.

pub mod delegate;
pub mod extension;
pub mod host;
pub mod item;
pub mod state;

pub use delegate::{MountDelegate, MountRefs};
pub use extension::{
    ExtensionData, ExtensionResult, LayoutVisitor, MountExtension, TreeExtension, same_extensions,
};
pub use host::{ContentHandle, Host, MountContent};
pub use item::{MountItem, MountItemFlags};
pub use state::{MAX_REMOUNT_ATTEMPTS, MountError, MountState};
