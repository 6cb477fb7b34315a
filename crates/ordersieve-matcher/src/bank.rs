//! The trigger bank: category-labelled patterns and the exclusion list.
//!
//! Confidence reflects specificity. A pattern that names both an order
//! verb and a concrete technology sits in the 0.85..0.95 range; looser
//! phrasings sit at 0.80..0.88. Exclusions veto a message outright on
//! any match and exist to keep commerce, spam, job-seeker and social
//! chatter out of the paid tier.

use ordersieve_protocol::OrderCategory;

/// One entry of the trigger bank.
#[derive(Debug, Clone, Copy)]
pub struct TriggerPattern {
    /// Stable human-readable name, recorded on every detection.
    pub name: &'static str,

    /// Source pattern, compiled case-insensitive, multi-line, Unicode.
    pub pattern: &'static str,

    /// Confidence carried by a match, in `[0, 1]`.
    pub confidence: f64,
}

/// All patterns of one category.
#[derive(Debug, Clone, Copy)]
pub struct CategoryTriggers {
    /// The category every pattern in this group detects.
    pub category: OrderCategory,

    /// The group's patterns.
    pub patterns: &'static [TriggerPattern],
}

/// The full trigger bank, grouped by category.
pub const TRIGGER_BANK: &[CategoryTriggers] = &[
    CategoryTriggers {
        category: OrderCategory::Backend,
        patterns: &[
            TriggerPattern {
                name: "hire-backend-developer",
                pattern: r"(?:нужен|нужна|нужны|ищем|ищу|требуется|требуются)\s+(?:опытный\s+|сильный\s+)?(?:python|java|go(?:lang)?|php|ruby|node(?:\.js)?|c#|\.net|rust|backend|бэкенд|бекенд)[\s-]*(?:разработчик|программист|developer|инженер)",
                confidence: 0.92,
            },
            TriggerPattern {
                name: "backend-build-task",
                pattern: r"(?:написать|разработать|сделать|доработать|допилить)\s+(?:api|бэкенд|backend|парсер|скрипт|бота|микросервис)",
                confidence: 0.87,
            },
            TriggerPattern {
                name: "direct-integration-order",
                pattern: r"(?:нужн\w+|требуется)\s+(?:интеграци\w+|парсинг|api)\b",
                confidence: 0.82,
            },
            TriggerPattern {
                name: "database-tuning",
                pattern: r"(?:настроить|оптимизировать|поднять)\s+(?:базу\s+данных|postgres\w*|mysql|clickhouse)",
                confidence: 0.80,
            },
        ],
    },
    CategoryTriggers {
        category: OrderCategory::Frontend,
        patterns: &[
            TriggerPattern {
                name: "hire-frontend-developer",
                pattern: r"(?:нужен|нужна|нужны|ищем|ищу|требуется|требуются)\s+(?:опытный\s+)?(?:react|vue|angular|svelte|frontend|фронтенд|верстальщик|typescript)[\s-]*(?:разработчик|программист|developer|специалист)?",
                confidence: 0.90,
            },
            TriggerPattern {
                name: "layout-task",
                pattern: r"(?:сверстать|верстк\w+|вёрстк\w+)\s+(?:сайт\w*|лендинг\w*|страниц\w*|макет\w*)",
                confidence: 0.86,
            },
            TriggerPattern {
                name: "website-order",
                pattern: r"(?:сделать|создать|разработать)\s+(?:сайт|лендинг|landing|интернет-магазин)",
                confidence: 0.84,
            },
        ],
    },
    CategoryTriggers {
        category: OrderCategory::Mobile,
        patterns: &[
            TriggerPattern {
                name: "hire-mobile-developer",
                pattern: r"(?:нужен|нужна|нужны|ищем|ищу|требуется|требуются)\s+(?:ios|android|flutter|react\s+native|kotlin|swift|мобильн\w+)[\s-]*(?:разработчик|программист|developer)",
                confidence: 0.92,
            },
            TriggerPattern {
                name: "mobile-app-order",
                pattern: r"(?:разработать|сделать|создать|написать)\s+(?:мобильное\s+)?приложение\s+(?:под|для|на)\s*(?:ios|android|телефон)",
                confidence: 0.86,
            },
            TriggerPattern {
                name: "app-development",
                pattern: r"разработк\w+\s+(?:мобильн\w+\s+)?приложени\w+",
                confidence: 0.81,
            },
        ],
    },
    CategoryTriggers {
        category: OrderCategory::AiMl,
        patterns: &[
            TriggerPattern {
                name: "hire-ml-engineer",
                pattern: r"(?:нужен|нужна|нужны|ищем|ищу|требуется|требуются)\s+(?:ml|ai|ии|data)[\s-]*(?:инженер|специалист|разработчик|engineer)",
                confidence: 0.91,
            },
            TriggerPattern {
                name: "train-model-order",
                pattern: r"(?:обучить|дообучить|натренировать|зафайнтюнить)\s+(?:модель|нейросеть|классификатор)",
                confidence: 0.87,
            },
            TriggerPattern {
                name: "ai-bot-order",
                pattern: r"(?:сделать|создать|разработать|написать)\s+(?:чат-?)?бота\s+(?:на|с)\s+(?:gpt|chatgpt|openai|ии|нейросет\w+)",
                confidence: 0.85,
            },
        ],
    },
    CategoryTriggers {
        category: OrderCategory::LowCode,
        patterns: &[
            TriggerPattern {
                name: "hire-nocode-specialist",
                pattern: r"(?:нужен|нужна|нужны|ищем|ищу|требуется|требуются)\s+(?:специалист|разработчик)?\s*(?:по\s+)?(?:tilda|тильд\w+|bubble|webflow|airtable|glide|no-?code|зерокодер\w*)",
                confidence: 0.88,
            },
            TriggerPattern {
                name: "builder-site-order",
                pattern: r"(?:собрать|сделать|настроить|перенести)\s+(?:сайт\s+)?(?:на|в)\s+(?:tilda|тильд\w+|bubble|webflow|wordpress|wix)",
                confidence: 0.86,
            },
            TriggerPattern {
                name: "nocode-automation",
                pattern: r"(?:настроить|автоматизировать|связать)\s+(?:в|через)\s+(?:zapier|make\.com|n8n|airtable|integromat)",
                confidence: 0.83,
            },
        ],
    },
    CategoryTriggers {
        category: OrderCategory::Other,
        patterns: &[
            TriggerPattern {
                name: "looking-for-contractor",
                pattern: r"(?:ищем|ищу)\s+(?:исполнител\w+|подрядчик\w+|фрилансер\w+)",
                confidence: 0.85,
            },
            TriggerPattern {
                name: "hire-generic-developer",
                pattern: r"(?:нужен|нужна|нужны|требуется|требуются)\s+(?:опытный\s+)?(?:разработчик|программист|фрилансер|it[\s-]?специалист)",
                confidence: 0.80,
            },
            TriggerPattern {
                name: "task-with-budget",
                pattern: r"(?:бюджет|оплата|плачу|заплачу)\W{0,3}\d[\d\s]*\s*(?:руб|₽|\$|usd|к\b|k\b)",
                confidence: 0.80,
            },
        ],
    },
];

/// Patterns that suppress detection entirely on any match.
pub const EXCLUSION_PATTERNS: &[&str] = &[
    // Commerce and sale spam.
    r"(?:продам|продаю|куплю|скидк\w+|распродаж\w+|промокод)",
    // Gambling and dating funnels.
    r"(?:казино|букмекер\w*|ставки\s+на\s+спорт|знакомств\w+)",
    // Job seekers advertising themselves, not orders.
    r"(?:ищу\s+работу|в\s+поиске\s+работы|рассмотрю\s+предложения|моё\s+резюме|мое\s+резюме)",
    // Channel growth and social chatter.
    r"(?:подписывайтесь|подпишись|наш\s+канал|взаимные\s+репост\w+)",
    // Course and webinar advertising.
    r"(?:бесплатн\w+\s+вебинар|курс\s+по|обучение\s+с\s+нуля|запишись\s+на\s+курс)",
];
