pub mod stage0_non_overlap;
pub mod stage1_global_align;
pub mod stage2_neighbours;
pub mod stage3_newline;

pub use stage0_non_overlap::*;
pub use stage1_global_align::*;
pub use stage2_neighbours::*;
pub use stage3_newline::*;
