// dictionary.rs - Humanizer Unit Dictionaries
// Per-language unit words used by the humanizer. A unit word is either a
// fixed string or a function of the count for languages that pluralize.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::localizer::humanizer::Unit;

#[derive(Clone)]
pub enum UnitFormatter {
    Literal(String),
    Pluralize(fn(f64) -> String),
}

impl UnitFormatter {
    pub fn render(&self, count: f64) -> String {
        match self {
            Self::Literal(word) => word.clone(),
            Self::Pluralize(pluralize) => pluralize(count),
        }
    }
}

impl fmt::Debug for UnitFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(word) => f.debug_tuple("Literal").field(word).finish(),
            Self::Pluralize(_) => f.write_str("Pluralize(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnitDictionary {
    pub words: HashMap<Unit, UnitFormatter>,
    pub decimal: String,
}

impl UnitDictionary {
    pub fn new(words: HashMap<Unit, UnitFormatter>, decimal: impl Into<String>) -> Self {
        Self {
            words,
            decimal: decimal.into(),
        }
    }

    /// Word for a unit; falls back to the unit tag if the dictionary lacks it.
    pub fn word(&self, unit: Unit, count: f64) -> String {
        self.words
            .get(&unit)
            .map(|formatter| formatter.render(count))
            .unwrap_or_else(|| unit.tag().to_string())
    }
}

fn english(singular: &str, count: f64) -> String {
    if count == 1.0 {
        singular.to_string()
    } else {
        format!("{}s", singular)
    }
}

/// Index into [many, one, few] forms of Slavic languages.
fn slavic_form(count: f64) -> usize {
    if count.floor() != count {
        return 2;
    }
    let c100 = count % 100.0;
    let c10 = count % 10.0;
    if (5.0..=20.0).contains(&c100) || (5.0..=9.0).contains(&c10) || c10 == 0.0 {
        0
    } else if c10 == 1.0 {
        1
    } else if count > 1.0 {
        2
    } else {
        0
    }
}

macro_rules! english_unit {
    ($word:literal) => {
        UnitFormatter::Pluralize(|c| english($word, c))
    };
}

macro_rules! russian_unit {
    ($many:literal, $one:literal, $few:literal) => {
        UnitFormatter::Pluralize(|c| [$many, $one, $few][slavic_form(c)].to_string())
    };
}

static ENGLISH: Lazy<UnitDictionary> = Lazy::new(|| {
    let words = HashMap::from([
        (Unit::Year, english_unit!("year")),
        (Unit::Month, english_unit!("month")),
        (Unit::Week, english_unit!("week")),
        (Unit::Day, english_unit!("day")),
        (Unit::Hour, english_unit!("hour")),
        (Unit::Minute, english_unit!("minute")),
        (Unit::Second, english_unit!("second")),
        (Unit::Millisecond, english_unit!("millisecond")),
    ]);
    UnitDictionary::new(words, ".")
});

static RUSSIAN: Lazy<UnitDictionary> = Lazy::new(|| {
    let words = HashMap::from([
        (Unit::Year, russian_unit!("лет", "год", "года")),
        (Unit::Month, russian_unit!("месяцев", "месяц", "месяца")),
        (Unit::Week, russian_unit!("недель", "неделя", "недели")),
        (Unit::Day, russian_unit!("дней", "день", "дня")),
        (Unit::Hour, russian_unit!("часов", "час", "часа")),
        (Unit::Minute, russian_unit!("минут", "минута", "минуты")),
        (Unit::Second, russian_unit!("секунд", "секунда", "секунды")),
        (
            Unit::Millisecond,
            russian_unit!("миллисекунд", "миллисекунда", "миллисекунды"),
        ),
    ]);
    UnitDictionary::new(words, ",")
});

/// Built-in dictionary for a language code, English when unknown.
pub fn builtin(language: &str) -> &'static UnitDictionary {
    match language {
        "ru" => &*RUSSIAN,
        _ => &*ENGLISH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_plurals() {
        let en = builtin("en");
        assert_eq!(en.word(Unit::Minute, 1.0), "minute");
        assert_eq!(en.word(Unit::Minute, 2.0), "minutes");
        assert_eq!(en.word(Unit::Second, 0.5), "seconds");
    }

    #[test]
    fn test_russian_forms() {
        let ru = builtin("ru");
        assert_eq!(ru.word(Unit::Minute, 1.0), "минута");
        assert_eq!(ru.word(Unit::Minute, 3.0), "минуты");
        assert_eq!(ru.word(Unit::Minute, 5.0), "минут");
        assert_eq!(ru.word(Unit::Minute, 11.0), "минут");
        assert_eq!(ru.word(Unit::Minute, 21.0), "минута");
        assert_eq!(ru.word(Unit::Minute, 1.5), "минуты");
        assert_eq!(ru.decimal, ",");
    }

    #[test]
    fn test_unknown_language_falls_back_to_english() {
        assert_eq!(builtin("xx").word(Unit::Hour, 2.0), "hours");
    }

    #[test]
    fn test_literal_formatter() {
        let dict = UnitDictionary::new(
            HashMap::from([(Unit::Second, UnitFormatter::Literal("s".to_string()))]),
            ".",
        );
        assert_eq!(dict.word(Unit::Second, 42.0), "s");
        assert_eq!(dict.word(Unit::Hour, 1.0), "h");
    }
}
