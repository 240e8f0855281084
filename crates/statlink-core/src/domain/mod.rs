//! # Domain Values
//!
//! Statistical-data values exchanged between the manager, drivers and caches.
//!
//! These types are deliberately thin: parsing wire formats and time periods
//! belongs to the drivers. What lives here is the shared vocabulary plus the
//! validation rules every driver is expected to apply.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`FlowRef`] | `AGENCY,ID,VERSION` reference to a dataflow |
//! | [`Flow`] | Dataflow metadata |
//! | [`Structure`] | Data structure definition (dimensions, attributes) |
//! | [`Key`] | Dot-separated series key with wildcards |
//! | [`DataQuery`] | Key plus level of detail |
//! | [`DataSet`] | Series returned for a query |
//! | [`Languages`] | Language priority list |

mod data;
mod flow;
mod key;
mod languages;
mod structure;

pub use data::{DataDetail, DataQuery, DataSet, Feature, Obs, Series};
pub use flow::{Flow, FlowRef};
pub use key::Key;
pub use languages::Languages;
pub use structure::{Attribute, Dimension, Structure};
