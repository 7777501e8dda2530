pub mod boxscore;
pub mod daily;
pub mod scoring;
