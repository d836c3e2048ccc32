use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::{AudioTrack, Job, StageError};
use crate::producers::AudioProducer;

/// 不合成旁白，返回显式的 Silent 音轨
#[derive(Debug, Default)]
pub struct SilentAudio;

#[async_trait]
impl AudioProducer for SilentAudio {
    async fn produce(&self, job: &Job, cancel: &CancellationToken) -> Result<AudioTrack, StageError> {
        if cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }
        tracing::debug!(job_id = %job.job_id(), "audio stage: silent track");
        Ok(AudioTrack::Silent)
    }
}
