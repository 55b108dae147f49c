// src/dressing/error.rs

#[derive(thiserror::Error, Debug)]
pub enum DressingError {
    #[error("cannot place cluster {cluster} of '{feature}': anchor space exhausted after {attempts} attempts")]
    AnchorSpaceExhausted { feature: String, cluster: usize, attempts: u32 },
}
