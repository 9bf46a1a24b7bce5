mod config;
mod dof_map;
mod global;
mod mesh;
mod parameters;
mod scheduler;
mod space;
mod warehouse;
