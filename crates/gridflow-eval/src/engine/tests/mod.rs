mod column_lookup;
mod common;
mod recompute;
