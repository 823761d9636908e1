//! Built-in interactive message views.
//!
//! - [`CounterView`]: a number everyone can bump with reactions.
//! - [`PagerView`]: a paginated list; 🔢 asks for a page number.
//! - [`NoticeView`]: published once, then left alone.

pub mod counter;
pub mod notice;
pub mod pager;

pub use counter::CounterView;
pub use notice::NoticeView;
pub use pager::PagerView;
