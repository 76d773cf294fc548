pub mod picker;
pub mod shared;
pub mod tags;

pub use picker::{ConnectionEntry, PriorityPicker, PriorityPickerBuilder, BALANCER_NAME};
pub use shared::SharedPicker;
pub use tags::{attach_traffic_tags, PriorityTagSet, MAX_PRIORITY_TAGS, TRAFFIC_TAG_KEY};
