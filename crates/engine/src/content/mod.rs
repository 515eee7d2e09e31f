mod atomic_io;
mod database;
mod loader;
mod types;

pub use atomic_io::{write_bytes_atomic, write_text_atomic};
pub use database::DefDatabase;
pub use loader::{load_def_database, load_def_database_from_str};
pub use types::{
    DefError, Flicker, LightAttachment, ParticleAttachment, SheetDims, TileDef,
};
