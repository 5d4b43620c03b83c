pub mod discontinuity;
pub mod extent;
pub mod navigator;
pub mod scale;
pub mod ticks;
pub mod window;
pub mod zoom;

pub use discontinuity::{Discontinuity, DiscontinuityKind, Identity, SkipWeekends};
pub use extent::{symmetrical_about_zero, y_extent, Padding};
pub use navigator::Navigator;
pub use scale::DateScale;
pub use ticks::{responsive_tick_count, TickInterval, TickSelection, TickSelector, TickUnit};
pub use window::{
    center_on_date, date_extent, filter_data_in_date_range, move_to_latest,
    move_to_latest_scaled, tracking_latest_data,
};
pub use zoom::{GestureContext, GestureOutcome, PanZoomController, ZoomTransform};
