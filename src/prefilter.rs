//! Deterministic pre-filter: rejects junk messages before any AI call.
//!
//! Staged checks:
//!   1. Blacklist terms (spam, ads, services): immediate drop
//!   2. Minimum length after URL stripping
//!   3. Whitelist boost for event-marker vocabulary
//!   4. Date/time patterns
//!   5. Venue/location patterns
//!   6. Attached media
//!
//! Pure function over text; it cannot fail and must run synchronously for
//! every message. In practice it drops the vast majority of raw traffic.

use regex::Regex;

use crate::types::message::RawMessage;

/// Score assigned on a blacklist hit.
pub const BLACKLIST_SCORE: i32 = -1;

/// Minimum score required to pass.
pub const SCORE_THRESHOLD: i32 = 2;

/// Minimum text length (URLs stripped) for a message to be considered.
pub const MIN_TEXT_LENGTH: usize = 80;

const BLACKLIST_TERMS: &[&str] = &[
    // Real estate
    "сдам", "сниму", "аренда", "вилла", "кондо", "квартир", "комнат",
    "жильё", "жилье", "апартамент", "резиденс", "долгосрок", "краткосрок",
    // Visas and paperwork
    "visa", "виза", "разрешение на работу", "work permit", "extension",
    // Crypto and exchange
    "usdt", "крипт", "биткоин", "btc", "eth", "обмен", "меняю", "курс валют",
    "exchange rate", "p2p",
    // Transport
    "байк", "nmax", "скутер", "мотобайк", "аренда байк", "rent bike",
    // Services
    "ноготочки", "массаж", "маникюр", "педикюр", "наращивание", "эпиляци",
    "трансфер", "такси", "доставка", "клининг", "стирка", "уборка",
    "ремонт", "сантехник", "электрик",
    // Cosmetology
    "реконструкц", "лифтинг", "фотосесс", "bbl", "ботокс", "филлер",
    // Classifieds
    "продам", "куплю", "продаю", "б/у", "торг",
    // Job ads
    "ищу работу", "вакансия", "требуется", "зарплата",
];

const WHITELIST_TERMS: &[&str] = &[
    // Russian
    "ивент", "мероприятие", "вечеринка", "тусовка", "тусовк", "митап",
    "нетворкинг", "встреча", "сходка", "движ", "движух",
    "спорт", "йога", "серфинг", "волейбол", "футбол", "бег",
    "мастер-класс", "воркшоп", "лекция", "семинар",
    "концерт", "фестиваль", "вечер", "открытие",
    "вход", "билет", "регистрация", "вход свободный",
    "приглашаем", "приходите", "ждём", "ждем", "присоединяйтесь",
    "добро пожаловать",
    // English
    "event", "party", "meetup", "networking", "gathering",
    "workshop", "masterclass", "lecture", "seminar",
    "concert", "festival", "opening", "dj", "live music",
    "ticket", "free entry", "registration", "rsvp",
    "join us", "welcome", "come join",
    "sunset", "beach party", "pool party", "rooftop",
];

const DATE_TIME_PATTERNS: &[&str] = &[
    r"\d{1,2}[./]\d{1,2}(?:[./]\d{2,4})?",
    r"\d{1,2}\s*(?:января|февраля|марта|апреля|мая|июня|июля|августа|сентября|октября|ноября|декабря)",
    r"\b(?:january|february|march|april|may|june|july|august|september|october|november|december)\s+\d{1,2}",
    r"\bв\s+\d{1,2}[:.]\d{2}\b",
    r"\b(?:at|from)\s+\d{1,2}[:.]\d{2}\b",
    r"\d{1,2}[:.]\d{2}\s*(?:-|–|—)\s*\d{1,2}[:.]\d{2}",
    r"\b(?:сегодня|завтра|послезавтра)\b",
    r"\b(?:today|tomorrow)\b",
    r"\b(?:в\s+)?(?:понедельник|вторник|сред[уы]|четверг|пятниц[уы]|суббот[уы]|воскресень[ея])\b",
    r"\b(?:on\s+)?(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
];

const LOCATION_PATTERNS: &[&str] = &[
    r"📍",
    r"\b(?:beach\s*club|bar|café|cafe|кафе|бар|ресторан|restaurant)\b",
    r"\b(?:coworking|коворкинг|hub|хаб|space|пространство)\b",
    r"\b(?:клуб|club|pool|бассейн|rooftop|крыша)\b",
    r"\b(?:адрес|address|место|location|venue|площадка)\b",
    r"\b(?:google\s*maps|goo\.gl|maps\.app)\b",
];

/// Verdict for a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterVerdict {
    /// Whether the message may proceed to the AI stages.
    pub passed: bool,

    /// Accumulated signal score; [`BLACKLIST_SCORE`] on a blacklist hit.
    pub score: i32,

    /// Diagnostic reason string.
    pub reason: String,
}

impl FilterVerdict {
    fn rejected(score: i32, reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            score,
            reason: reason.into(),
        }
    }
}

/// Order-preserving result of a batch filter run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Messages that passed, with their verdicts.
    pub passed: Vec<(RawMessage, FilterVerdict)>,

    /// Messages that were dropped, with their verdicts.
    pub dropped: Vec<(RawMessage, FilterVerdict)>,
}

impl BatchOutcome {
    /// Total messages examined.
    pub fn total(&self) -> usize {
        self.passed.len() + self.dropped.len()
    }

    /// Fraction of messages that passed, 0.0 when the batch was empty.
    pub fn pass_rate(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.passed.len() as f64 / self.total() as f64
    }
}

/// The compiled pre-filter.
pub struct PreFilter {
    blacklist: Regex,
    whitelist: Regex,
    datetime: Regex,
    location: Regex,
    urls: Regex,
    min_text_len: usize,
    threshold: i32,
}

impl Default for PreFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl PreFilter {
    /// Compile the built-in vocabularies.
    pub fn new() -> Self {
        let alternation = |terms: &[&str]| {
            let escaped: Vec<String> = terms.iter().map(|t| regex::escape(t)).collect();
            format!(r"(?i)\b(?:{})", escaped.join("|"))
        };
        let union = |patterns: &[&str]| format!("(?i){}", patterns.join("|"));

        Self {
            blacklist: Regex::new(&alternation(BLACKLIST_TERMS)).expect("blacklist pattern"),
            whitelist: Regex::new(&alternation(WHITELIST_TERMS)).expect("whitelist pattern"),
            datetime: Regex::new(&union(DATE_TIME_PATTERNS)).expect("datetime pattern"),
            location: Regex::new(&union(LOCATION_PATTERNS)).expect("location pattern"),
            urls: Regex::new(r"https?://\S+").expect("url pattern"),
            min_text_len: MIN_TEXT_LENGTH,
            threshold: SCORE_THRESHOLD,
        }
    }

    /// Override the minimum length, for tuning.
    pub fn with_min_text_len(mut self, min: usize) -> Self {
        self.min_text_len = min;
        self
    }

    /// Override the pass threshold, for tuning.
    pub fn with_threshold(mut self, threshold: i32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Run the filter over one message.
    pub fn check(&self, text: &str, has_media: bool) -> FilterVerdict {
        if text.is_empty() {
            return FilterVerdict::rejected(0, "empty");
        }

        // Blacklist drops immediately, regardless of any other signal.
        if let Some(hit) = self.blacklist.find(text) {
            return FilterVerdict::rejected(
                BLACKLIST_SCORE,
                format!("blacklist: {}", hit.as_str()),
            );
        }

        // Length counts descriptive content only, so URLs are stripped first.
        let clean = self.urls.replace_all(text, "");
        let clean_len = clean.trim().chars().count();
        if clean_len < self.min_text_len {
            return FilterVerdict::rejected(0, format!("too_short: {clean_len} chars"));
        }

        let mut score = 0;
        let mut reasons: Vec<String> = Vec::new();

        let whitelist_hits = self.whitelist.find_iter(text).count();
        if whitelist_hits > 0 {
            score += (whitelist_hits as i32).min(3);
            reasons.push(format!("whitelist({whitelist_hits})"));
        }

        let datetime_hits = self.datetime.find_iter(text).count();
        if datetime_hits > 0 {
            score += 2;
            reasons.push(format!("datetime({datetime_hits})"));
        }

        let location_hits = self.location.find_iter(text).count();
        if location_hits > 0 {
            score += 1;
            reasons.push(format!("location({location_hits})"));
        }

        if has_media {
            score += 1;
            reasons.push("has_media".to_string());
        }

        let passed = score >= self.threshold;
        let signals = if reasons.is_empty() {
            "no_signals".to_string()
        } else {
            reasons.join("; ")
        };

        FilterVerdict {
            passed,
            score,
            reason: format!("score={score}/{} [{signals}]", self.threshold),
        }
    }

    /// Run the filter over a batch, partitioning into passed and dropped.
    ///
    /// Order within each partition follows input order. This stage cannot
    /// fail; every message lands in exactly one partition with a verdict.
    pub fn check_batch(&self, messages: Vec<RawMessage>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for message in messages {
            let verdict = self.check(&message.text, message.has_media);
            if verdict.passed {
                outcome.passed.push((message, verdict));
            } else {
                outcome.dropped.push((message, verdict));
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> PreFilter {
        PreFilter::new()
    }

    #[test]
    fn blacklist_drops_regardless_of_other_signals() {
        let verdict = filter().check("Продам байк Nmax 2023, 45000 бат", true);
        assert!(!verdict.passed);
        assert_eq!(verdict.score, BLACKLIST_SCORE);
        assert!(verdict.reason.starts_with("blacklist:"));
    }

    #[test]
    fn short_text_is_rejected_even_with_whitelist_terms() {
        let verdict = filter().check("party tonight!", false);
        assert!(!verdict.passed);
        assert!(verdict.reason.contains("too_short"));
    }

    #[test]
    fn urls_do_not_count_toward_length() {
        let text = format!("party {}", "https://example.com/".repeat(10));
        let verdict = filter().check(&text, false);
        assert!(verdict.reason.contains("too_short"));
    }

    #[test]
    fn event_announcement_scores_high() {
        let text = "Друзья, приглашаем всех на вечеринку в 19:00 в эту субботу! \
                    Живая музыка, dj и бассейн, вход свободный для всех гостей.";
        let verdict = filter().check(text, true);
        assert!(verdict.passed, "reason: {}", verdict.reason);
        assert!(verdict.score >= 4, "score: {}", verdict.score);
    }

    #[test]
    fn empty_text_has_its_own_reason() {
        let verdict = filter().check("", false);
        assert_eq!(verdict.reason, "empty");
    }

    #[test]
    fn long_text_without_signals_fails() {
        let text = "просто очень длинное сообщение ни о чём конкретном, в котором \
                    нет ни дат, ни времени, ни названий, лишь рассуждения о жизни";
        let verdict = filter().check(text, false);
        assert!(!verdict.passed);
        assert!(verdict.reason.contains("no_signals") || verdict.score < SCORE_THRESHOLD);
    }

    #[test]
    fn batch_partitions_preserve_order() {
        let messages = vec![
            RawMessage::new("Продам байк Nmax, срочно, недорого, торг уместен"),
            RawMessage::new(
                "Приглашаем на йогу на закате завтра в 18:30 на пляже, \
                 вход свободный, коврики есть на месте, приходите заранее",
            ),
            RawMessage::new("коротко"),
        ];
        let outcome = filter().check_batch(messages);
        assert_eq!(outcome.total(), 3);
        assert_eq!(outcome.passed.len(), 1);
        assert_eq!(outcome.dropped.len(), 2);
        assert!(outcome.dropped[0].1.reason.starts_with("blacklist:"));
        assert!(outcome.dropped[1].1.reason.contains("too_short"));
        assert!((outcome.pass_rate() - 1.0 / 3.0).abs() < 1e-9);
    }
}
