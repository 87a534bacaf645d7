//! Static catalog of supported backends and their models.
//!
//! Pure data, no behavior beyond lookup and projection. The catalog lists
//! every backend the gateway knows how to talk to, configured or not; the
//! registry decides at startup which of them are actually usable.

use serde::Serialize;

/// Relative latency class of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpeedClass {
    UltraFast,
    Fast,
    Medium,
}

/// Relative output quality class of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityClass {
    Good,
    High,
    Premium,
}

/// Per-model attributes.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelDescriptor {
    /// Model identifier as the backend expects it.
    pub id: &'static str,
    /// Context window in tokens.
    pub context: u32,
    pub speed: SpeedClass,
    pub quality: QualityClass,
    /// Usable on the backend's free tier.
    pub free: bool,
}

/// Static description of one backend.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BackendDescriptor {
    /// Stable key used in configuration and requests (e.g. `"groq"`).
    pub id: &'static str,
    /// Human-readable display name.
    pub name: &'static str,
    pub description: &'static str,
    pub free_tier: bool,
    pub free_limit: &'static str,
    pub website: &'static str,
    /// Supported models, first entry is the backend's default.
    pub models: &'static [ModelDescriptor],
}

const GROQ_MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "llama-3.3-70b-versatile",
        context: 128_000,
        speed: SpeedClass::Fast,
        quality: QualityClass::High,
        free: true,
    },
    ModelDescriptor {
        id: "llama-3.1-8b-instant",
        context: 128_000,
        speed: SpeedClass::UltraFast,
        quality: QualityClass::Good,
        free: true,
    },
    ModelDescriptor {
        id: "meta-llama/llama-4-scout-17b-16e-instruct",
        context: 128_000,
        speed: SpeedClass::Fast,
        quality: QualityClass::High,
        free: true,
    },
    ModelDescriptor {
        id: "meta-llama/llama-4-maverick-17b-128e-instruct",
        context: 128_000,
        speed: SpeedClass::Fast,
        quality: QualityClass::High,
        free: true,
    },
    ModelDescriptor {
        id: "qwen/qwen3-32b",
        context: 32_768,
        speed: SpeedClass::Fast,
        quality: QualityClass::High,
        free: true,
    },
    ModelDescriptor {
        id: "moonshotai/kimi-k2-instruct",
        context: 128_000,
        speed: SpeedClass::Fast,
        quality: QualityClass::High,
        free: true,
    },
];

const OPENROUTER_MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "google/gemini-2.0-flash-exp:free",
        context: 1_000_000,
        speed: SpeedClass::Fast,
        quality: QualityClass::High,
        free: true,
    },
    ModelDescriptor {
        id: "meta-llama/llama-3.3-70b-instruct:free",
        context: 128_000,
        speed: SpeedClass::Medium,
        quality: QualityClass::High,
        free: true,
    },
    ModelDescriptor {
        id: "qwen/qwen-2.5-72b-instruct:free",
        context: 32_768,
        speed: SpeedClass::Medium,
        quality: QualityClass::High,
        free: true,
    },
    ModelDescriptor {
        id: "anthropic/claude-3-5-sonnet",
        context: 200_000,
        speed: SpeedClass::Medium,
        quality: QualityClass::Premium,
        free: false,
    },
    ModelDescriptor {
        id: "openai/gpt-4o",
        context: 128_000,
        speed: SpeedClass::Medium,
        quality: QualityClass::Premium,
        free: false,
    },
];

const CEREBRAS_MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "llama3.1-70b",
        context: 8_192,
        speed: SpeedClass::UltraFast,
        quality: QualityClass::High,
        free: true,
    },
    ModelDescriptor {
        id: "llama3.1-8b",
        context: 8_192,
        speed: SpeedClass::UltraFast,
        quality: QualityClass::Good,
        free: true,
    },
];

const TOGETHER_MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "meta-llama/Meta-Llama-3.3-70B-Instruct-Turbo",
        context: 128_000,
        speed: SpeedClass::Fast,
        quality: QualityClass::High,
        free: false,
    },
    ModelDescriptor {
        id: "meta-llama/Llama-3.2-11B-Vision-Instruct-Turbo",
        context: 128_000,
        speed: SpeedClass::Fast,
        quality: QualityClass::Good,
        free: false,
    },
    ModelDescriptor {
        id: "Qwen/Qwen2.5-72B-Instruct-Turbo",
        context: 32_768,
        speed: SpeedClass::Fast,
        quality: QualityClass::High,
        free: false,
    },
];

const OPENAI_MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "gpt-5",
        context: 128_000,
        speed: SpeedClass::Medium,
        quality: QualityClass::Premium,
        free: false,
    },
    ModelDescriptor {
        id: "gpt-5-mini",
        context: 128_000,
        speed: SpeedClass::Fast,
        quality: QualityClass::High,
        free: false,
    },
    ModelDescriptor {
        id: "gpt-5-nano",
        context: 128_000,
        speed: SpeedClass::UltraFast,
        quality: QualityClass::Good,
        free: false,
    },
    ModelDescriptor {
        id: "gpt-4.1",
        context: 128_000,
        speed: SpeedClass::Medium,
        quality: QualityClass::Premium,
        free: false,
    },
    ModelDescriptor {
        id: "gpt-4.1-mini",
        context: 128_000,
        speed: SpeedClass::Fast,
        quality: QualityClass::High,
        free: false,
    },
    ModelDescriptor {
        id: "gpt-4-turbo",
        context: 128_000,
        speed: SpeedClass::Medium,
        quality: QualityClass::Premium,
        free: false,
    },
    ModelDescriptor {
        id: "gpt-4",
        context: 8_192,
        speed: SpeedClass::Medium,
        quality: QualityClass::High,
        free: false,
    },
    ModelDescriptor {
        id: "gpt-3.5-turbo",
        context: 16_385,
        speed: SpeedClass::Fast,
        quality: QualityClass::Good,
        free: false,
    },
];

const ANTHROPIC_MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "claude-opus-4-5-20251101",
        context: 200_000,
        speed: SpeedClass::Medium,
        quality: QualityClass::Premium,
        free: false,
    },
    ModelDescriptor {
        id: "claude-sonnet-4-5-20250929",
        context: 200_000,
        speed: SpeedClass::Fast,
        quality: QualityClass::Premium,
        free: false,
    },
    ModelDescriptor {
        id: "claude-haiku-4-5-20251001",
        context: 200_000,
        speed: SpeedClass::UltraFast,
        quality: QualityClass::High,
        free: false,
    },
    ModelDescriptor {
        id: "claude-sonnet-4-20250514",
        context: 200_000,
        speed: SpeedClass::Fast,
        quality: QualityClass::Premium,
        free: false,
    },
    ModelDescriptor {
        id: "claude-3-5-haiku-20241022",
        context: 200_000,
        speed: SpeedClass::UltraFast,
        quality: QualityClass::High,
        free: false,
    },
];

const CATALOG: &[BackendDescriptor] = &[
    BackendDescriptor {
        id: "groq",
        name: "Groq",
        description: "Ultra-fast inference with Llama models",
        free_tier: true,
        free_limit: "14,400 requests/day",
        website: "https://console.groq.com",
        models: GROQ_MODELS,
    },
    BackendDescriptor {
        id: "openrouter",
        name: "OpenRouter",
        description: "Access 100+ models through one API",
        free_tier: true,
        free_limit: "Free credits on signup + pay-per-use",
        website: "https://openrouter.ai",
        models: OPENROUTER_MODELS,
    },
    BackendDescriptor {
        id: "cerebras",
        name: "Cerebras",
        description: "Fastest AI inference - 2000+ tokens/sec",
        free_tier: true,
        free_limit: "Free tier with rate limits",
        website: "https://cloud.cerebras.ai",
        models: CEREBRAS_MODELS,
    },
    BackendDescriptor {
        id: "together",
        name: "Together AI",
        description: "Open-source models at scale",
        free_tier: true,
        free_limit: "$5 free credits on signup",
        website: "https://together.ai",
        models: TOGETHER_MODELS,
    },
    BackendDescriptor {
        id: "openai",
        name: "OpenAI",
        description: "GPT-4 and GPT-5 models",
        free_tier: false,
        free_limit: "Pay-per-use only",
        website: "https://platform.openai.com",
        models: OPENAI_MODELS,
    },
    BackendDescriptor {
        id: "anthropic",
        name: "Anthropic",
        description: "Claude models - Advanced reasoning and analysis",
        free_tier: false,
        free_limit: "Pay-per-use only",
        website: "https://console.anthropic.com",
        models: ANTHROPIC_MODELS,
    },
];

/// All known backends, in canonical display order.
pub fn all() -> &'static [BackendDescriptor] {
    CATALOG
}

/// Look up one backend by id.
pub fn find(id: &str) -> Option<&'static BackendDescriptor> {
    CATALOG.iter().find(|descriptor| descriptor.id == id)
}

/// One model joined with its owning backend, for flat listings.
#[derive(Debug, Clone, Serialize)]
pub struct ModelListing {
    pub provider: &'static str,
    pub provider_name: &'static str,
    pub model: &'static str,
    pub context: u32,
    pub speed: SpeedClass,
    pub quality: QualityClass,
    pub free: bool,
    pub available: bool,
}

/// All models partitioned for UI consumption.
#[derive(Debug, Clone, Serialize)]
pub struct ModelPartition {
    pub free: Vec<ModelListing>,
    pub paid: Vec<ModelListing>,
    pub unavailable: Vec<ModelListing>,
}

/// Free-tier models across backends the given predicate marks configured.
pub fn free_models(is_configured: impl Fn(&str) -> bool) -> Vec<ModelListing> {
    CATALOG
        .iter()
        .filter(|descriptor| is_configured(descriptor.id))
        .flat_map(|descriptor| {
            descriptor
                .models
                .iter()
                .filter(|model| model.free)
                .map(|model| listing(descriptor, model, true))
        })
        .collect()
}

/// Partition every known model into free/available, paid/available, and
/// unavailable (backend not configured).
pub fn partition_models(is_configured: impl Fn(&str) -> bool) -> ModelPartition {
    let mut partition = ModelPartition {
        free: Vec::new(),
        paid: Vec::new(),
        unavailable: Vec::new(),
    };

    for descriptor in CATALOG {
        let available = is_configured(descriptor.id);
        for model in descriptor.models {
            let entry = listing(descriptor, model, available);
            if !available {
                partition.unavailable.push(entry);
            } else if model.free {
                partition.free.push(entry);
            } else {
                partition.paid.push(entry);
            }
        }
    }

    partition
}

fn listing(
    descriptor: &'static BackendDescriptor,
    model: &'static ModelDescriptor,
    available: bool,
) -> ModelListing {
    ModelListing {
        provider: descriptor.id,
        provider_name: descriptor.name,
        model: model.id,
        context: model.context,
        speed: model.speed,
        quality: model.quality,
        free: model.free,
        available,
    }
}
