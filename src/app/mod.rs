// Application layer: pipelines wired from domain ports.

pub mod pipelines;
