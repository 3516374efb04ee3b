pub mod config;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod media;
pub mod processing {
    pub mod layout;
    pub mod scale;
}
pub mod scan;
pub mod sink;
pub mod tasks {
    pub mod player;
}
