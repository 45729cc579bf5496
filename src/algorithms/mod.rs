/*
This tool is part of the WhiteboxTools geospatial analysis library.
Authors: Dr. John Lindsay
Created: 30/08/2018
Last Modified: 25/09/2018
License: MIT
*/
// private sub-module defined in other files
mod delaunay_triangulation;

// exports identifiers from private sub-modules in the current module namespace
pub use self::delaunay_triangulation::{triangulate, Triangulation};
pub use self::delaunay_triangulation::EMPTY;
