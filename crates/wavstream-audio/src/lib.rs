pub mod chunker;
pub mod pacer;
pub mod wav;

pub use chunker::{Chunker, Chunks};
pub use pacer::Pacer;
pub use wav::{read_wav, read_wav_from, utterance_id};
