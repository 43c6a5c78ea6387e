// frac!(-1) gets expanded to frac!(-1 * DENOM). I don't want to change this.
#![allow(clippy::neg_multiply)]

pub mod brick;
pub mod explore;
pub mod fract;
pub mod gridding;
pub mod group_classes;
pub mod hall;
pub mod isometry;
pub mod lattice;
pub mod matching;
pub mod normalizer;
pub mod parsing;
pub mod sampling;
pub mod seminvariant;
pub mod spacegroup;
pub mod symbols;
pub mod symmop;
pub mod wyckoff;
