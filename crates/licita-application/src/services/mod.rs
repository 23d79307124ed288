//! Pure, I/O-free algorithms shared by the use cases. Kept separate from
//! `use_cases` because they need no port, only data.

pub mod chunker;
