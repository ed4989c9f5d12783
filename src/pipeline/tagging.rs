//! Pre-upload tagging: companion-audio mux and color tagging.

use std::path::PathBuf;
use std::sync::Arc;

use vfxupload_av::actions::artifact_path;
use vfxupload_av::{MediaProber, ProbeResult, Transcoder, Workspace};
use vfxupload_core::{ColorSpace, ColorTags, JobId, Result};

use super::resolver::PathResolver;
use crate::state::{Job, JobFailure, JobStatus, JobStore};
use crate::store::ObjectStore;

/// What has to happen to a render before upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagPlan {
    /// No audio and wrong tags: mux companion audio and write the tags in
    /// the same ffmpeg pass.
    MuxWithColor(ColorTags),
    MuxOnly,
    /// Audio present, tags wrong: stream-copy remux with new tags.
    ColorOnly(ColorTags),
    Nothing,
}

impl TagPlan {
    pub fn decide(probe: &ProbeResult, target: ColorSpace) -> Self {
        let color = target
            .expected_tags()
            .filter(|_| probe.needs_color_tag(target));
        match (probe.has_audio, color) {
            (false, Some(tags)) => TagPlan::MuxWithColor(tags),
            (false, None) => TagPlan::MuxOnly,
            (true, Some(tags)) => TagPlan::ColorOnly(tags),
            (true, None) => TagPlan::Nothing,
        }
    }

    pub fn needs_mux(&self) -> bool {
        matches!(self, TagPlan::MuxWithColor(_) | TagPlan::MuxOnly)
    }

    pub fn color_tags(&self) -> Option<ColorTags> {
        match self {
            TagPlan::MuxWithColor(tags) | TagPlan::ColorOnly(tags) => Some(*tags),
            TagPlan::MuxOnly | TagPlan::Nothing => None,
        }
    }
}

/// Runs one job from `pending` to `tagged` (or `failed`).
pub struct Tagger {
    store: Arc<dyn ObjectStore>,
    resolver: Arc<PathResolver>,
    prober: Arc<dyn MediaProber>,
    transcoder: Arc<dyn Transcoder>,
}

impl Tagger {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        resolver: Arc<PathResolver>,
        prober: Arc<dyn MediaProber>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            store,
            resolver,
            prober,
            transcoder,
        }
    }

    /// Probe, decide, mux and/or tag, then mark the job `tagged`.
    ///
    /// A failed step only fails the job when nothing usable was produced:
    /// if the mux worked but a later step did not, the muxed file is
    /// uploaded. The destination file name follows whichever artifact will
    /// be uploaded.
    pub async fn tag_job(&self, jobs: &JobStore, id: JobId) -> Result<()> {
        let job = jobs.update(id, Job::forget_artifacts)?;
        let file = job.file_name.as_str();

        let probe = match self.prober.probe(&job.source).await {
            Ok(probe) => probe,
            Err(e) => {
                tracing::warn!(file, "probe failed, assuming audio is present: {e}");
                ProbeResult::assume_audio()
            }
        };
        let plan = TagPlan::decide(&probe, job.color_space);
        tracing::debug!(
            file,
            has_audio = probe.has_audio,
            primaries = probe.color_primaries.as_deref().unwrap_or("-"),
            transfer = probe.color_transfer.as_deref().unwrap_or("-"),
            space = probe.color_space.as_deref().unwrap_or("-"),
            target = %job.color_space,
            ?plan,
            "probed"
        );

        jobs.set_status(id, JobStatus::MuxingAudio)?;
        let mut error: Option<String> = None;

        let mut muxed = None;
        if plan.needs_mux() {
            match self.mux(&job, plan.color_tags()).await {
                Ok(Some(path)) => {
                    tracing::info!(file, output = %path.display(), "muxed audio");
                    muxed = Some(path);
                }
                Ok(None) => tracing::debug!(file, "no companion audio, mux skipped"),
                Err(e) => {
                    tracing::warn!(file, "mux failed: {e}");
                    error = Some(e.to_string());
                }
            }
        }

        let mut tagged = None;
        if let (Some(tags), None) = (plan.color_tags(), &muxed) {
            jobs.set_status(id, JobStatus::TaggingColor)?;
            let output = artifact_path(&job.source, "tagged");
            match self.transcoder.tag_color(&job.source, tags, &output).await {
                Ok(()) => {
                    tracing::info!(file, output = %output.display(), "color tagged");
                    tagged = Some(output);
                }
                Err(e) => {
                    tracing::warn!(file, "color tag failed: {e}");
                    error.get_or_insert_with(|| e.to_string());
                }
            }
        }

        let upload_file: Option<PathBuf> = tagged.clone().or_else(|| muxed.clone());
        if let (None, Some(err)) = (&upload_file, error) {
            return jobs.set_status(id, JobStatus::Failed(JobFailure::tagging(err)));
        }

        jobs.update(id, |j| {
            j.muxed_file = muxed;
            j.tagged_file = tagged;
            if let Some(name) = upload_file.as_deref().and_then(|p| p.file_name()) {
                j.set_destination_file_name(&name.to_string_lossy());
            }
        })?;
        jobs.set_status(id, JobStatus::Tagged)
    }

    /// Fetch the shot's companion audio and mux it into the render. `None`
    /// when the job has no project or identity, or the plates folder has no
    /// audio.
    async fn mux(&self, job: &Job, color: Option<ColorTags>) -> Result<Option<PathBuf>> {
        let (Some(project), Some(parsed)) = (&job.project, &job.parsed) else {
            return Ok(None);
        };
        let folder = self
            .resolver
            .find_shot_folder(project, &parsed.shot_prefix())
            .await?;
        let stems = self.resolver.find_plates_audio(project, &folder).await?;
        if stems.is_empty() {
            return Ok(None);
        }

        let workspace = Workspace::new()?;
        let plates = format!("{}/{}/{}", project.base(), folder, project.plates_folder);

        let audio = match stems.iter().find(|s| s.to_lowercase().contains("merged")) {
            Some(merged) => {
                let local = workspace.file(merged);
                self.store
                    .download(&project.bucket, &format!("{plates}/{merged}"), &local)
                    .await?;
                local
            }
            None => {
                let mut locals = Vec::with_capacity(stems.len());
                for stem in &stems {
                    let local = workspace.file(stem);
                    self.store
                        .download(&project.bucket, &format!("{plates}/{stem}"), &local)
                        .await?;
                    locals.push(local);
                }
                let merged = workspace.file("merged.wav");
                self.transcoder.mix_audio(&locals, &merged).await?;
                merged
            }
        };

        let output = artifact_path(&job.source, "muxed");
        self.transcoder
            .mux_audio(&job.source, &audio, color, &output)
            .await?;
        Ok(Some(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(has_audio: bool, tags: Option<(&str, &str, &str)>) -> ProbeResult {
        ProbeResult {
            has_audio,
            color_primaries: tags.map(|t| t.0.to_string()),
            color_transfer: tags.map(|t| t.1.to_string()),
            color_space: tags.map(|t| t.2.to_string()),
        }
    }

    const P3: (&str, &str, &str) = ("smpte432", "smpte2084", "bt2020nc");

    #[test]
    fn decision_table() {
        let target = ColorSpace::P3D65Pq;
        let tags = target.expected_tags().unwrap();

        assert_eq!(TagPlan::decide(&probe(false, None), target), TagPlan::MuxWithColor(tags));
        assert_eq!(TagPlan::decide(&probe(false, Some(P3)), target), TagPlan::MuxOnly);
        assert_eq!(TagPlan::decide(&probe(true, None), target), TagPlan::ColorOnly(tags));
        assert_eq!(TagPlan::decide(&probe(true, Some(P3)), target), TagPlan::Nothing);
    }

    #[test]
    fn none_target_never_tags() {
        assert_eq!(TagPlan::decide(&probe(false, None), ColorSpace::None), TagPlan::MuxOnly);
        assert_eq!(TagPlan::decide(&probe(true, None), ColorSpace::None), TagPlan::Nothing);
    }

    #[test]
    fn unknown_probe_values_need_tagging() {
        let plan = TagPlan::decide(
            &probe(true, Some(("unknown", "smpte2084", "bt2020nc"))),
            ColorSpace::P3D65Pq,
        );
        assert!(matches!(plan, TagPlan::ColorOnly(_)));
    }

    #[test]
    fn failed_probe_never_muxes() {
        let plan = TagPlan::decide(&ProbeResult::assume_audio(), ColorSpace::Rec709);
        assert!(!plan.needs_mux());
        assert_eq!(plan.color_tags(), ColorSpace::Rec709.expected_tags());
    }
}
