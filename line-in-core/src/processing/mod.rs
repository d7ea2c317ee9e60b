pub mod chunker;
pub mod frame_ring;
pub mod pcm;
