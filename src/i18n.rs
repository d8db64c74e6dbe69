//! Internationalization
//!
//! Owns the current language and the translation tables, substitutes text
//! into every `data-i18n-key` element and keeps doing so for content added
//! later. Lookups resolve in three tiers: the requested language, the
//! fallback language, then the key itself.

use crate::document::{self, Document, Element, NodeId, BODY, ROOT};
use crate::errors::StorageError;
use crate::events::{EventBus, PageEvent};
use crate::observability::telemetry::sanitize_for_log;
use crate::storage::{keys, MemoryStorage, Storage};
use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const TRANSLATION_KEY_ATTR: &str = "data-i18n-key";
const TRANSITION_DURATION: Duration = Duration::from_millis(300);

const EMBEDDED_ZH_CN: &str = include_str!("../i18n/zh-CN.json");
const EMBEDDED_EN: &str = include_str!("../i18n/en.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "zh-CN")]
    ZhCn,
    #[serde(rename = "en")]
    En,
}

impl Language {
    /// Supported languages in toggle order.
    pub const SUPPORTED: [Language; 2] = [Language::ZhCn, Language::En];
    pub const FALLBACK: Language = Language::ZhCn;

    pub fn code(self) -> &'static str {
        match self {
            Language::ZhCn => "zh-CN",
            Language::En => "en",
        }
    }

    pub fn from_code(code: &str) -> Option<Language> {
        Self::SUPPORTED.into_iter().find(|l| l.code() == code)
    }

    /// Match a browser language tag: exact code first, then the primary
    /// subtag as a prefix (`en-US` → `en`), then the fallback.
    pub fn detect(browser: &str) -> Language {
        if let Some(exact) = Self::from_code(browser) {
            return exact;
        }
        let prefix = browser.split('-').next().unwrap_or_default();
        Self::SUPPORTED
            .into_iter()
            .find(|l| l.code().starts_with(prefix))
            .unwrap_or(Self::FALLBACK)
    }

    /// The next language in toggle order.
    pub fn next(self) -> Language {
        let index = Self::SUPPORTED.iter().position(|&l| l == self).unwrap_or(0);
        Self::SUPPORTED[(index + 1) % Self::SUPPORTED.len()]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Sender half of the locale channel. `None` until I18n has loaded.
pub type LocaleSender = watch::Sender<Option<Language>>;
pub type LocaleReceiver = watch::Receiver<Option<Language>>;

pub fn locale_channel() -> (LocaleSender, LocaleReceiver) {
    watch::channel(None)
}

/// Where translation tables come from.
#[derive(Debug, Clone, Default)]
pub enum TranslationSource {
    /// Tables compiled into the binary.
    #[default]
    Embedded,
    /// `<dir>/<code>.json` per language.
    Directory(PathBuf),
}

impl TranslationSource {
    async fn load(&self, lang: Language) -> anyhow::Result<Value> {
        let raw = match self {
            TranslationSource::Embedded => match lang {
                Language::ZhCn => EMBEDDED_ZH_CN.to_string(),
                Language::En => EMBEDDED_EN.to_string(),
            },
            TranslationSource::Directory(dir) => {
                let path = dir.join(format!("{}.json", lang.code()));
                tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?
            }
        };
        serde_json::from_str(&raw).with_context(|| format!("Invalid {lang} translation table"))
    }

    /// Load every supported table concurrently. Failures are logged and
    /// the table is left out.
    pub async fn load_all(&self) -> BTreeMap<Language, Arc<Value>> {
        let loads = Language::SUPPORTED.map(|lang| async move { (lang, self.load(lang).await) });
        let mut tables = BTreeMap::new();
        for (lang, result) in futures::future::join_all(loads).await {
            match result {
                Ok(table) => {
                    tables.insert(lang, Arc::new(table));
                }
                Err(e) => error!(language = %lang, error = %format!("{e:#}"), "Error loading translations"),
            }
        }
        if !tables.contains_key(&Language::FALLBACK) {
            warn!("Fallback language not available");
        } else if tables.len() == Language::SUPPORTED.len() {
            debug!("All translations loaded");
        }
        tables
    }
}

/// Dot-path lookup. Only non-empty strings count as a translation.
fn lookup<'a>(table: &'a Value, key: &str) -> Option<&'a str> {
    key.split('.')
        .try_fold(table, |node, part| node.get(part))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Which property of an element a translation lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TranslationTarget {
    Value,
    Placeholder,
    Title,
    Alt,
    Text,
}

impl TranslationTarget {
    fn for_element(e: &Element) -> Self {
        if e.tag == "input" || e.tag == "textarea" {
            match e.get_attr("type") {
                Some("submit") | Some("button") => TranslationTarget::Value,
                _ => TranslationTarget::Placeholder,
            }
        } else if e.attributes.contains_key("title") {
            TranslationTarget::Title
        } else if e.attributes.contains_key("alt") {
            TranslationTarget::Alt
        } else {
            TranslationTarget::Text
        }
    }
}

// ─── Locale formatting ─────────────────────────────────────────────────

/// Integer with comma digit grouping. Both supported locales group by
/// thousands with `,`.
pub fn format_number(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Short numeric date.
pub fn format_date(lang: Language, date: NaiveDate) -> String {
    match lang {
        Language::En => format!("{}/{}/{}", date.month(), date.day(), date.year()),
        Language::ZhCn => format!("{}/{}/{}", date.year(), date.month(), date.day()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    fn en(self) -> &'static str {
        match self {
            TimeUnit::Second => "second",
            TimeUnit::Minute => "minute",
            TimeUnit::Hour => "hour",
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
            TimeUnit::Month => "month",
            TimeUnit::Year => "year",
        }
    }

    fn zh(self) -> &'static str {
        match self {
            TimeUnit::Second => "秒钟",
            TimeUnit::Minute => "分钟",
            TimeUnit::Hour => "小时",
            TimeUnit::Day => "天",
            TimeUnit::Week => "周",
            TimeUnit::Month => "个月",
            TimeUnit::Year => "年",
        }
    }
}

fn relative_phrase(lang: Language, value: i64, unit: TimeUnit) -> Option<&'static str> {
    use TimeUnit::*;
    let phrase = match (lang, unit, value) {
        (Language::En, Second, 0) => "now",
        (Language::En, Minute, 0) => "this minute",
        (Language::En, Hour, 0) => "this hour",
        (Language::En, Day, -1) => "yesterday",
        (Language::En, Day, 0) => "today",
        (Language::En, Day, 1) => "tomorrow",
        (Language::En, Week, -1) => "last week",
        (Language::En, Week, 0) => "this week",
        (Language::En, Week, 1) => "next week",
        (Language::En, Month, -1) => "last month",
        (Language::En, Month, 0) => "this month",
        (Language::En, Month, 1) => "next month",
        (Language::En, Year, -1) => "last year",
        (Language::En, Year, 0) => "this year",
        (Language::En, Year, 1) => "next year",
        (Language::ZhCn, Second, 0) => "现在",
        (Language::ZhCn, Minute, 0) => "此刻",
        (Language::ZhCn, Hour, 0) => "这一时间",
        (Language::ZhCn, Day, -2) => "前天",
        (Language::ZhCn, Day, -1) => "昨天",
        (Language::ZhCn, Day, 0) => "今天",
        (Language::ZhCn, Day, 1) => "明天",
        (Language::ZhCn, Day, 2) => "后天",
        (Language::ZhCn, Week, -1) => "上周",
        (Language::ZhCn, Week, 0) => "本周",
        (Language::ZhCn, Week, 1) => "下周",
        (Language::ZhCn, Month, -1) => "上个月",
        (Language::ZhCn, Month, 0) => "本月",
        (Language::ZhCn, Month, 1) => "下个月",
        (Language::ZhCn, Year, -1) => "去年",
        (Language::ZhCn, Year, 0) => "今年",
        (Language::ZhCn, Year, 1) => "明年",
        _ => return None,
    };
    Some(phrase)
}

/// Relative time with `numeric: "auto"` wording ("yesterday", "明天").
pub fn format_relative_time(lang: Language, value: i64, unit: TimeUnit) -> String {
    if let Some(phrase) = relative_phrase(lang, value, unit) {
        return phrase.to_string();
    }
    let n = value.unsigned_abs();
    match lang {
        Language::En => {
            let plural = if n == 1 { "" } else { "s" };
            if value < 0 {
                format!("{n} {}{plural} ago", unit.en())
            } else {
                format!("in {n} {}{plural}", unit.en())
            }
        }
        Language::ZhCn => {
            let direction = if value < 0 { "前" } else { "后" };
            format!("{n}{}{direction}", unit.zh())
        }
    }
}

// ─── I18n service ──────────────────────────────────────────────────────

/// Handles I18n needs from the page.
#[derive(Clone)]
pub struct I18nDeps {
    pub document: Arc<Document>,
    pub storage: Arc<dyn Storage>,
    pub bus: EventBus,
    pub locale: Arc<LocaleSender>,
    pub browser_language: Option<String>,
    pub source: TranslationSource,
}

pub struct I18n {
    document: Arc<Document>,
    storage: Arc<dyn Storage>,
    bus: EventBus,
    locale: Arc<LocaleSender>,
    tables: BTreeMap<Language, Arc<Value>>,
    current: RwLock<Language>,
    observer: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for I18n {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("I18n")
            .field("current", &self.current_language())
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Disables the language switch for the duration of a switch.
struct SwitchGuard<'a> {
    document: &'a Document,
    switch: Option<NodeId>,
    container: Option<NodeId>,
}

impl<'a> SwitchGuard<'a> {
    fn engage(document: &'a Document) -> Self {
        let switch = document.by_id("lang-switch");
        let container = switch.and_then(|s| document.closest(s, "switch-container"));
        if let Some(switch) = switch {
            document.set_flag(switch, "disabled", true);
        }
        if let Some(container) = container {
            document.add_class(container, "loading");
        }
        Self {
            document,
            switch,
            container,
        }
    }
}

impl Drop for SwitchGuard<'_> {
    fn drop(&mut self) {
        if let Some(switch) = self.switch {
            self.document.set_flag(switch, "disabled", false);
        }
        if let Some(container) = self.container {
            self.document.remove_class(container, "loading");
        }
    }
}

impl I18n {
    /// Load the tables, pick the initial language, translate the page and
    /// start watching for added content.
    pub async fn initialize(deps: I18nDeps) -> Arc<Self> {
        let tables = deps.source.load_all().await;
        let language = Self::initial_language(deps.storage.as_ref(), deps.browser_language.as_deref());

        let i18n = Arc::new(Self {
            document: deps.document,
            storage: deps.storage,
            bus: deps.bus,
            locale: deps.locale,
            tables,
            current: RwLock::new(language),
            observer: Mutex::new(None),
        });
        i18n.apply_translations();
        i18n.update_language_ui();
        i18n.locale.send_replace(Some(language));
        i18n.spawn_observer();
        info!(language = %language, tables = i18n.tables.len(), "I18n initialized");
        i18n
    }

    /// An I18n over the given tables, attached to a blank document of its
    /// own. Nothing is applied or observed.
    pub fn detached(tables: BTreeMap<Language, Value>, language: Language) -> Self {
        Self {
            document: Arc::new(Document::new()),
            storage: Arc::new(MemoryStorage::new()),
            bus: EventBus::new(),
            locale: Arc::new(locale_channel().0),
            tables: tables.into_iter().map(|(l, t)| (l, Arc::new(t))).collect(),
            current: RwLock::new(language),
            observer: Mutex::new(None),
        }
    }

    /// A detached I18n with no tables: every lookup echoes the key.
    pub fn empty() -> Self {
        Self::detached(BTreeMap::new(), Language::FALLBACK)
    }

    fn initial_language(storage: &dyn Storage, browser: Option<&str>) -> Language {
        if let Some(saved) = storage.get(keys::PREFERRED_LANGUAGE) {
            match Language::from_code(&saved) {
                Some(lang) => return lang,
                None => warn!(code = %sanitize_for_log(&saved), "Ignoring stored language"),
            }
        }
        browser.map(Language::detect).unwrap_or(Language::FALLBACK)
    }

    pub fn current_language(&self) -> Language {
        *self.current.read()
    }

    pub fn supported_languages(&self) -> Vec<Language> {
        Language::SUPPORTED.to_vec()
    }

    pub fn is_language_supported(&self, code: &str) -> bool {
        Language::from_code(code).is_some()
    }

    pub fn table(&self, lang: Language) -> Option<Arc<Value>> {
        self.tables.get(&lang).cloned()
    }

    pub fn translate(&self, key: &str) -> String {
        self.translate_in(key, self.current_language())
    }

    pub fn translate_in(&self, key: &str, lang: Language) -> String {
        if let Some(found) = self.tables.get(&lang).and_then(|t| lookup(t, key)) {
            return found.to_string();
        }
        if lang != Language::FALLBACK {
            if let Some(found) = self
                .tables
                .get(&Language::FALLBACK)
                .and_then(|t| lookup(t, key))
            {
                warn!(key, language = %lang, "Translation missing, using fallback");
                return found.to_string();
            }
        }
        warn!(key, "Translation missing");
        key.to_string()
    }

    /// Translate every marked element, the document title, the meta
    /// description and the root `lang` attribute.
    pub fn apply_translations(&self) {
        let nodes = self.document.by_attr(TRANSLATION_KEY_ATTR);
        for &node in &nodes {
            let Some((key, target)) = self.document.with_element(node, |e| {
                e.get_attr(TRANSLATION_KEY_ATTR)
                    .map(|k| (k.to_string(), TranslationTarget::for_element(e)))
            })
            .flatten() else {
                continue;
            };
            let text = self.translate(&key);
            match target {
                TranslationTarget::Value => self.document.set_attr(node, "value", &text),
                TranslationTarget::Placeholder => self.document.set_attr(node, "placeholder", &text),
                TranslationTarget::Title => self.document.set_attr(node, "title", &text),
                TranslationTarget::Alt => self.document.set_attr(node, "alt", &text),
                TranslationTarget::Text => self.document.set_text(node, &text),
            }
        }
        self.update_document_meta();
        debug!(elements = nodes.len(), "Translations applied");
    }

    fn update_document_meta(&self) {
        let title = self.translate("site.title");
        let description = self.translate("site.description");
        self.document.set_title(&title);
        if self.document.has_meta("description") {
            self.document.set_meta("description", &description);
        }
        self.document
            .set_attr(ROOT, "lang", self.current_language().code());
    }

    /// Sync `#lang-switch` (checked means English) and its container label.
    pub fn update_language_ui(&self) {
        let Some(switch) = self.document.by_id("lang-switch") else {
            return;
        };
        let lang = self.current_language();
        self.document.set_flag(switch, "checked", lang == Language::En);
        if let Some(container) = self.document.closest(switch, "switch-container") {
            let title = match lang {
                Language::ZhCn => "切换语言",
                Language::En => "Switch Language",
            };
            self.document.set_attr(container, "title", title);
            self.document.set_attr(container, "aria-label", title);
        }
    }

    /// Switch to `lang`. No-op if it is already current.
    pub fn switch_language(&self, lang: Language) -> Result<(), StorageError> {
        if lang == self.current_language() {
            return Ok(());
        }
        let _guard = SwitchGuard::engage(&self.document);

        *self.current.write() = lang;
        self.storage.set(keys::PREFERRED_LANGUAGE, lang.code())?;
        self.apply_translations();
        self.update_language_ui();
        self.locale.send_replace(Some(lang));

        self.bus.emit(PageEvent::LanguageChanged {
            new_language: lang,
            translations: self.table(lang).unwrap_or_else(|| Arc::new(Value::Null)),
        });
        document::flash_class(&self.document, BODY, "language-transition", TRANSITION_DURATION);
        info!(language = %lang, "Language switched");
        Ok(())
    }

    /// Switch by language code. Unsupported codes are logged and ignored.
    pub fn switch_language_code(&self, code: &str) -> Result<(), StorageError> {
        match Language::from_code(code) {
            Some(lang) => self.switch_language(lang),
            None => {
                warn!(code = %sanitize_for_log(code), "Language is not supported");
                Ok(())
            }
        }
    }

    pub fn toggle_language(&self) -> Result<(), StorageError> {
        self.switch_language(self.current_language().next())
    }

    pub fn format_number(&self, value: i64) -> String {
        format_number(value)
    }

    pub fn format_date(&self, date: NaiveDate) -> String {
        format_date(self.current_language(), date)
    }

    pub fn format_relative_time(&self, value: i64, unit: TimeUnit) -> String {
        format_relative_time(self.current_language(), value, unit)
    }

    fn is_translatable(&self, added: &[NodeId]) -> bool {
        added.iter().any(|&node| {
            self.document.has_attr(node, TRANSLATION_KEY_ATTR)
                || !self
                    .document
                    .descendants_where(node, |e| e.attributes.contains_key(TRANSLATION_KEY_ATTR))
                    .is_empty()
        })
    }

    /// Re-translate when marked content is added. Records arriving within
    /// one scheduler turn are folded into a single pass.
    fn spawn_observer(self: &Arc<Self>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let weak: Weak<Self> = Arc::downgrade(self);
        let mut rx = self.document.subscribe_mutations();
        let task = handle.spawn(async move {
            loop {
                let mut dirty = match rx.recv().await {
                    Ok(record) => match weak.upgrade() {
                        Some(i18n) => i18n.is_translatable(&record.added),
                        None => break,
                    },
                    Err(broadcast::error::RecvError::Lagged(_)) => true,
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                tokio::task::yield_now().await;
                let Some(i18n) = weak.upgrade() else {
                    break;
                };
                loop {
                    match rx.try_recv() {
                        Ok(record) => dirty |= i18n.is_translatable(&record.added),
                        Err(broadcast::error::TryRecvError::Lagged(_)) => dirty = true,
                        Err(_) => break,
                    }
                }
                if dirty {
                    i18n.apply_translations();
                }
            }
        });
        *self.observer.lock() = Some(task);
    }
}

impl Drop for I18n {
    fn drop(&mut self) {
        if let Some(task) = self.observer.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::homepage_template;
    use serde_json::json;

    fn tables() -> BTreeMap<Language, Value> {
        BTreeMap::from([
            (
                Language::ZhCn,
                json!({"nav": {"about": "关于", "home": "首页"}, "only": {"zh": "仅中文"}}),
            ),
            (Language::En, json!({"nav": {"about": "About", "home": ""}})),
        ])
    }

    fn deps(storage: Arc<dyn Storage>, browser: Option<&str>) -> I18nDeps {
        I18nDeps {
            document: Arc::new(homepage_template()),
            storage,
            bus: EventBus::new(),
            locale: Arc::new(locale_channel().0),
            browser_language: browser.map(str::to_string),
            source: TranslationSource::Embedded,
        }
    }

    #[test]
    fn test_detect_browser_language() {
        assert_eq!(Language::detect("en"), Language::En);
        assert_eq!(Language::detect("en-US"), Language::En);
        assert_eq!(Language::detect("zh-TW"), Language::ZhCn);
        assert_eq!(Language::detect("fr-FR"), Language::ZhCn);
        assert_eq!(Language::from_code("EN"), None);
    }

    #[test]
    fn test_three_tier_lookup() {
        let i18n = I18n::detached(tables(), Language::En);
        assert_eq!(i18n.translate("nav.about"), "About");
        assert_eq!(i18n.translate("only.zh"), "仅中文");
        // Empty strings fall through like missing ones
        assert_eq!(i18n.translate("nav.home"), "首页");
        assert_eq!(i18n.translate("nav.missing"), "nav.missing");
        // Objects are not translations
        assert_eq!(i18n.translate("nav"), "nav");
        assert_eq!(i18n.translate_in("nav.about", Language::ZhCn), "关于");
    }

    #[test]
    fn test_empty_echoes_keys() {
        let i18n = I18n::empty();
        assert_eq!(i18n.translate("site.title"), "site.title");
        assert_eq!(i18n.current_language(), Language::ZhCn);
    }

    #[test]
    fn test_format_number_grouping() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(-98765), "-98,765");
    }

    #[test]
    fn test_format_date_per_locale() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 21).unwrap();
        assert_eq!(format_date(Language::En, date), "6/21/2025");
        assert_eq!(format_date(Language::ZhCn, date), "2025/6/21");
    }

    #[test]
    fn test_relative_time_numeric_auto() {
        assert_eq!(format_relative_time(Language::En, -1, TimeUnit::Day), "yesterday");
        assert_eq!(format_relative_time(Language::En, 3, TimeUnit::Hour), "in 3 hours");
        assert_eq!(format_relative_time(Language::En, -1, TimeUnit::Minute), "1 minute ago");
        assert_eq!(format_relative_time(Language::ZhCn, 2, TimeUnit::Day), "后天");
        assert_eq!(format_relative_time(Language::ZhCn, -5, TimeUnit::Minute), "5分钟前");
        assert_eq!(format_relative_time(Language::ZhCn, 0, TimeUnit::Second), "现在");
    }

    #[tokio::test]
    async fn test_initialize_applies_translations() {
        let d = deps(Arc::new(MemoryStorage::new()), Some("en-GB"));
        let doc = Arc::clone(&d.document);
        let i18n = I18n::initialize(d).await;

        assert_eq!(i18n.current_language(), Language::En);
        assert_eq!(doc.attr(ROOT, "lang").as_deref(), Some("en"));
        assert_eq!(doc.title(), "Personal Homepage");
        assert_eq!(
            doc.meta_content("description").as_deref(),
            Some("A personal homepage for notes and projects")
        );

        let skip = doc.by_class("skip-link")[0];
        assert_eq!(doc.text(skip).as_deref(), Some("Skip to main content"));
        // Missing in en, taken from zh-CN
        let motto = doc.select(|e| e.get_attr(TRANSLATION_KEY_ATTR) == Some("hero.motto"))[0];
        assert_eq!(doc.text(motto).as_deref(), Some("保持好奇，持续构建"));
        // Element kinds
        let button = doc.by_id("data-manager-btn").unwrap();
        assert_eq!(doc.attr(button, "title").as_deref(), Some("Data Manager"));
        let submit = doc.select(|e| e.get_attr("type") == Some("submit"))[0];
        assert_eq!(doc.attr(submit, "value").as_deref(), Some("Send"));
        let text_input = doc.select(|e| e.get_attr(TRANSLATION_KEY_ATTR) == Some("contact.placeholder"))[0];
        assert_eq!(doc.attr(text_input, "placeholder").as_deref(), Some("Leave your email"));
        let img = doc.select(|e| e.get_attr(TRANSLATION_KEY_ATTR) == Some("cards.image"))[0];
        assert_eq!(doc.attr(img, "alt").as_deref(), Some("Project screenshot"));

        let switch = doc.by_id("lang-switch").unwrap();
        assert!(doc.has_attr(switch, "checked"));
    }

    #[tokio::test]
    async fn test_stored_language_wins_over_browser() {
        let storage: Arc<dyn Storage> =
            Arc::new(MemoryStorage::with_entries([(keys::PREFERRED_LANGUAGE, "zh-CN")]));
        let i18n = I18n::initialize(deps(storage, Some("en-US"))).await;
        assert_eq!(i18n.current_language(), Language::ZhCn);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_language_persists_and_emits() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let d = deps(Arc::clone(&storage), None);
        let doc = Arc::clone(&d.document);
        let bus = d.bus.clone();
        let locale = d.locale.subscribe();
        let i18n = I18n::initialize(d).await;
        let mut rx = bus.subscribe();

        i18n.switch_language(Language::ZhCn).unwrap();
        assert!(rx.try_recv().is_err());

        i18n.toggle_language().unwrap();
        assert_eq!(i18n.current_language(), Language::En);
        assert_eq!(storage.get(keys::PREFERRED_LANGUAGE).as_deref(), Some("en"));
        assert_eq!(*locale.borrow(), Some(Language::En));
        match rx.try_recv().unwrap() {
            PageEvent::LanguageChanged { new_language, translations } => {
                assert_eq!(new_language, Language::En);
                assert_eq!(translations["nav"]["about"], "About");
            }
            other => panic!("unexpected event {other:?}"),
        }

        let switch = doc.by_id("lang-switch").unwrap();
        let container = doc.closest(switch, "switch-container").unwrap();
        assert!(!doc.has_attr(switch, "disabled"));
        assert!(!doc.has_class(container, "loading"));
        assert_eq!(doc.attr(container, "title").as_deref(), Some("Switch Language"));
        assert!(doc.has_class(BODY, "language-transition"));

        tokio::time::sleep(TRANSITION_DURATION + Duration::from_millis(1)).await;
        assert!(!doc.has_class(BODY, "language-transition"));

        i18n.switch_language_code("fr").unwrap();
        assert_eq!(i18n.current_language(), Language::En);
    }

    #[tokio::test(start_paused = true)]
    async fn test_added_content_is_translated() {
        let d = deps(Arc::new(MemoryStorage::new()), Some("en"));
        let doc = Arc::clone(&d.document);
        let _i18n = I18n::initialize(d).await;

        let node = doc.append(
            BODY,
            Element::new("span").attr(TRANSLATION_KEY_ATTR, "stats.visitors"),
        );
        assert_eq!(doc.text(node).as_deref(), Some(""));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(doc.text(node).as_deref(), Some("Visitors"));
    }

    #[tokio::test]
    async fn test_directory_source_missing_table_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("en.json"), r#"{"greeting": "hi"}"#).unwrap();
        let tables = TranslationSource::Directory(dir.path().to_path_buf())
            .load_all()
            .await;
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[&Language::En]["greeting"], "hi");
    }
}
