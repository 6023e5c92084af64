pub mod build;
pub mod export;
pub mod new;
pub mod run;
pub mod target;
