//! Management access to live properties.
//!
//! [`PropertyAccessor`] is the get/set/list contract; [`ManagementFacade`]
//! serves serializable requests against it so an application can expose the
//! properties over any transport.

mod accessor;
mod facade;

pub use accessor::PropertyAccessor;
pub use facade::{ManagementFacade, ManagementRequest, ManagementResponse};
