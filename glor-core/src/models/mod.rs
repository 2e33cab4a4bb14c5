mod about;
mod game;
mod hero;
mod news;

pub use about::AboutBlock;
pub use game::{Category, Game};
pub use hero::HeroContent;
pub use news::{split_by_status, News, NewsStatus};
