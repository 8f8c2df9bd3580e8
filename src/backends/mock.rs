// src/backends/mock.rs
//! Test doubles: fixed answers, hard failures and stalls past any sane deadline.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::{EntityModel, LabelScore, RawEntity, ZeroShotModel};

/// Returns the same spans for every input.
#[derive(Clone, Default)]
pub struct FixedEntities {
    pub fixed: Vec<RawEntity>,
}

#[async_trait]
impl EntityModel for FixedEntities {
    async fn recognize(&self, _text: &str) -> Result<Vec<RawEntity>> {
        Ok(self.fixed.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Returns the same scores for every input, whatever labels were asked for.
#[derive(Clone, Default)]
pub struct FixedScores {
    pub fixed: Vec<LabelScore>,
}

#[async_trait]
impl ZeroShotModel for FixedScores {
    async fn classify(&self, _text: &str, _labels: &[String]) -> Result<Vec<LabelScore>> {
        Ok(self.fixed.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Always errors, like a model that failed to load.
#[derive(Clone, Copy, Default)]
pub struct FailingModel;

#[async_trait]
impl EntityModel for FailingModel {
    async fn recognize(&self, _text: &str) -> Result<Vec<RawEntity>> {
        Err(anyhow!("model unavailable"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

#[async_trait]
impl ZeroShotModel for FailingModel {
    async fn classify(&self, _text: &str, _labels: &[String]) -> Result<Vec<LabelScore>> {
        Err(anyhow!("model unavailable"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Sleeps for `delay` before answering with nothing.
#[derive(Clone, Copy)]
pub struct StallingModel {
    pub delay: Duration,
}

#[async_trait]
impl EntityModel for StallingModel {
    async fn recognize(&self, _text: &str) -> Result<Vec<RawEntity>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "stalling"
    }
}

#[async_trait]
impl ZeroShotModel for StallingModel {
    async fn classify(&self, _text: &str, _labels: &[String]) -> Result<Vec<LabelScore>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "stalling"
    }
}
