//! Experimentation service endpoints.

/// Fixed endpoint paths, relative to `{base_url}/{api_version}/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ValidateApiKey,
    ValidateExperiment,
    InsertInference,
    Experiment,
    ListModels,
    ExperimentDetail,
    BuildChatModel,
    TrackReward,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::ValidateApiKey => "external/validate-api-key",
            Endpoint::ValidateExperiment => "external/validate-experiment",
            Endpoint::InsertInference => "external/insert/inference",
            Endpoint::Experiment => "experiment",
            Endpoint::ListModels => "experiment/models",
            Endpoint::ExperimentDetail => "experiment/detail",
            Endpoint::BuildChatModel => "experiment/build/chat",
            Endpoint::TrackReward => "ai/track",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}
