pub mod lrc_import;
pub mod melody_csv;
pub mod model;
pub mod song_dir;

pub use lrc_import::*;
pub use melody_csv::*;
pub use model::*;
pub use song_dir::*;
