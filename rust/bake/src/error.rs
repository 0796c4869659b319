// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::dispatch::DispatchError;

/// Result type for bake operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a bake
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid mesh: {0}")]
    Validation(vertex_bake_topology::Error),

    #[error("Invalid bake configuration: {0}")]
    Configuration(String),

    #[error("Compute dispatch failed: {0}")]
    ComputeDispatch(#[from] DispatchError),

    #[error("Bake cancelled")]
    Cancelled,

    #[error("Bake already aborted at the {0:?} stage")]
    Aborted(BakeStage),
}

/// The part of a bake an error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeStage {
    Validation,
    Configuration,
    Dispatch,
    Cancelled,
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    pub fn stage(&self) -> BakeStage {
        match self {
            Error::Validation(_) => BakeStage::Validation,
            Error::Configuration(_) => BakeStage::Configuration,
            Error::ComputeDispatch(_) => BakeStage::Dispatch,
            Error::Cancelled => BakeStage::Cancelled,
            Error::Aborted(stage) => *stage,
        }
    }
}

impl From<vertex_bake_topology::Error> for Error {
    fn from(err: vertex_bake_topology::Error) -> Self {
        if err.is_configuration() {
            Error::Configuration(err.to_string())
        } else {
            Error::Validation(err)
        }
    }
}
