/// Ordered phases of a single extraction attempt.
///
/// Each stage owns a slice of the 0..=100 progress bar. The split is
/// cosmetic; only the network call itself is real work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stage {
    #[default]
    Uploading,
    Processing,
    Extracting,
    Finalizing,
}

/// Highest progress the animation may reach before the response arrives.
pub const ANIMATION_CEILING: u8 = 89;

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Uploading,
        Stage::Processing,
        Stage::Extracting,
        Stage::Finalizing,
    ];

    /// Half-open progress range `[start, end)`; `Finalizing` ends at 100 inclusive.
    pub fn progress_range(self) -> (u8, u8) {
        match self {
            Stage::Uploading => (0, 30),
            Stage::Processing => (30, 60),
            Stage::Extracting => (60, 90),
            Stage::Finalizing => (90, 100),
        }
    }

    pub fn for_progress(progress: u8) -> Stage {
        match progress {
            0..=29 => Stage::Uploading,
            30..=59 => Stage::Processing,
            60..=89 => Stage::Extracting,
            _ => Stage::Finalizing,
        }
    }

    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Uploading => Some(Stage::Processing),
            Stage::Processing => Some(Stage::Extracting),
            Stage::Extracting => Some(Stage::Finalizing),
            Stage::Finalizing => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Uploading => "Secure Document",
            Stage::Processing => "Advanced Processing",
            Stage::Extracting => "AI Intelligence Analysis",
            Stage::Finalizing => "Structured Data Finalization",
        }
    }

    pub fn status_message(self) -> &'static str {
        match self {
            Stage::Uploading => "Securing document...",
            Stage::Processing => "Processing with advanced algorithms...",
            Stage::Extracting => "Analyzing with AI intelligence...",
            Stage::Finalizing => "Finalizing structured data...",
        }
    }
}

/// Next animation value: advances by `step`, never past [`ANIMATION_CEILING`].
pub fn animate_progress(current: u8, step: u8) -> u8 {
    current.saturating_add(step.max(1)).min(ANIMATION_CEILING).max(current)
}
