// Sentiment roll-up over a batch of collected posts. Scoring itself is behind
// the SentimentScorer trait; this module only aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use postpulse_common::text_extract::top_words;
use postpulse_common::Post;

const TOP_WORDS: usize = 10;
const TOP_WORD_MIN_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Unknown,
}

/// Scorer output for one text. `score` is the model confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub label: String,
    pub score: f64,
    pub sentiment: Sentiment,
}

#[derive(Debug, thiserror::Error)]
#[error("sentiment scoring failed: {0}")]
pub struct ScoreError(pub String);

/// A synchronous, side-effect free text classifier.
pub trait SentimentScorer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<SentimentScore, ScoreError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedPost {
    pub post: Post,
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTotals {
    pub analyzed: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub average_confidence: f64,
}

/// Everything persisted for one analyzed account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub handle: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    pub posts: Vec<AnalyzedPost>,
    pub totals: AnalysisTotals,
    pub most_positive: Option<AnalyzedPost>,
    pub most_negative: Option<AnalyzedPost>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub top_words: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

/// Score every post and aggregate.
///
/// A scorer failure does not abort the batch: that post is recorded as
/// `Unknown` with zero confidence.
pub fn analyze_posts(
    handle: &str,
    display_name: Option<&str>,
    avatar: Option<&str>,
    posts: Vec<Post>,
    scorer: &dyn SentimentScorer,
) -> AnalysisSummary {
    info!(handle, posts = posts.len(), "Starting sentiment analysis");

    let words = top_words(posts.iter().map(Post::content), TOP_WORDS, TOP_WORD_MIN_LEN);

    let analyzed: Vec<AnalyzedPost> = posts
        .into_iter()
        .map(|post| {
            let score = scorer.analyze(post.content()).unwrap_or_else(|err| {
                warn!(post_id = post.id(), error = %err, "Scoring failed, marking post unknown");
                SentimentScore {
                    label: "UNKNOWN".into(),
                    score: 0.0,
                    sentiment: Sentiment::Unknown,
                }
            });
            AnalyzedPost {
                post,
                sentiment: score.sentiment,
                confidence: score.score.clamp(0.0, 1.0),
                label: score.label,
            }
        })
        .collect();

    let totals = totals(&analyzed);
    debug!(
        positive = totals.positive,
        negative = totals.negative,
        neutral = totals.neutral,
        "Sentiment counts"
    );

    let most_positive = strongest(&analyzed, Sentiment::Positive);
    let most_negative = strongest(&analyzed, Sentiment::Negative);

    let display_name = display_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(handle)
        .to_string();

    AnalysisSummary {
        handle: handle.to_string(),
        display_name,
        avatar: avatar.map(str::to_string),
        summary: summary_line(&totals),
        posts: analyzed,
        totals,
        most_positive,
        most_negative,
        top_words: words,
        analyzed_at: Utc::now(),
    }
}

fn totals(posts: &[AnalyzedPost]) -> AnalysisTotals {
    let count = |s: Sentiment| posts.iter().filter(|p| p.sentiment == s).count();
    let average_confidence = if posts.is_empty() {
        0.0
    } else {
        posts.iter().map(|p| p.confidence).sum::<f64>() / posts.len() as f64
    };
    AnalysisTotals {
        analyzed: posts.len(),
        positive: count(Sentiment::Positive),
        negative: count(Sentiment::Negative),
        neutral: count(Sentiment::Neutral),
        average_confidence,
    }
}

/// Highest-confidence post with `sentiment`, else the first post. `None` only
/// for an empty batch. Ties go to the earlier post.
fn strongest(posts: &[AnalyzedPost], sentiment: Sentiment) -> Option<AnalyzedPost> {
    posts
        .iter()
        .filter(|p| p.sentiment == sentiment)
        .fold(None, |best: Option<&AnalyzedPost>, p| match best {
            Some(b) if b.confidence >= p.confidence => Some(b),
            _ => Some(p),
        })
        .or_else(|| posts.first())
        .cloned()
}

fn summary_line(totals: &AnalysisTotals) -> String {
    if totals.analyzed == 0 {
        return "No posts were analyzed.".to_string();
    }

    let n = totals.analyzed as f64;
    let positive = totals.positive as f64 / n;
    let negative = totals.negative as f64 / n;

    let overall = if positive > 0.7 {
        "very positive"
    } else if positive > 0.55 {
        "positive"
    } else if negative > 0.7 {
        "very negative"
    } else if negative > 0.55 {
        "negative"
    } else {
        "neutral"
    };

    format!(
        "Analyzed {} posts. Overall sentiment: {overall}. Average confidence: {:.1}%.",
        totals.analyzed,
        totals.average_confidence * 100.0
    )
}
