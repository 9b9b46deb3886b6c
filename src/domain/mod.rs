// Domain layer - Core split types

pub mod model;
