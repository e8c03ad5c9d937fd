// humanizer.rs - Duration Humanizer
// Turns a millisecond duration into text such as "1 hour, 2 minutes" by
// decomposing it over a ladder of units and rendering each piece through a
// language's unit dictionary.
//
// Key Features:
// - Configurable unit ladder and unit measures
// - Optional rounding that folds pieces up into larger units
// - `largest` cap on the number of rendered pieces
// - Delimiter / conjunction / serial comma joining
// - Per-call overrides that never mutate the instance

use std::collections::HashMap;

use crate::localizer::dictionary::{self, UnitDictionary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl Unit {
    pub const ALL: [Unit; 8] = [
        Unit::Year,
        Unit::Month,
        Unit::Week,
        Unit::Day,
        Unit::Hour,
        Unit::Minute,
        Unit::Second,
        Unit::Millisecond,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Unit::Year => "y",
            Unit::Month => "mo",
            Unit::Week => "w",
            Unit::Day => "d",
            Unit::Hour => "h",
            Unit::Minute => "m",
            Unit::Second => "s",
            Unit::Millisecond => "ms",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Unit> {
        Unit::ALL.into_iter().find(|unit| unit.tag() == tag)
    }

    /// Length of the unit in milliseconds.
    pub fn default_measure(self) -> f64 {
        match self {
            Unit::Year => 31_557_600_000.0,
            Unit::Month => 2_629_800_000.0,
            Unit::Week => 604_800_000.0,
            Unit::Day => 86_400_000.0,
            Unit::Hour => 3_600_000.0,
            Unit::Minute => 60_000.0,
            Unit::Second => 1_000.0,
            Unit::Millisecond => 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HumanizerOptions {
    pub language: String,
    pub delimiter: String,
    pub spacer: String,
    /// Placed before the last piece; empty means plain delimiter joining.
    pub conjunction: String,
    pub serial_comma: bool,
    pub round: bool,
    /// Maximum number of rendered pieces.
    pub largest: Option<usize>,
    /// Unit ladder, largest first.
    pub units: Vec<Unit>,
    pub unit_measures: HashMap<Unit, f64>,
    /// Overrides the dictionary's decimal separator.
    pub decimal: Option<String>,
    pub max_decimal_points: Option<u32>,
}

impl Default for HumanizerOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            delimiter: ", ".to_string(),
            spacer: " ".to_string(),
            conjunction: String::new(),
            serial_comma: true,
            round: false,
            largest: None,
            units: vec![
                Unit::Year,
                Unit::Month,
                Unit::Week,
                Unit::Day,
                Unit::Hour,
                Unit::Minute,
                Unit::Second,
            ],
            unit_measures: Unit::ALL
                .into_iter()
                .map(|unit| (unit, unit.default_measure()))
                .collect(),
            decimal: None,
            max_decimal_points: None,
        }
    }
}

/// Per-call changes layered over an instance's options.
#[derive(Debug, Clone, Default)]
pub struct HumanizerOverrides {
    pub language: Option<String>,
    pub delimiter: Option<String>,
    pub spacer: Option<String>,
    pub conjunction: Option<String>,
    pub serial_comma: Option<bool>,
    pub round: Option<bool>,
    pub largest: Option<usize>,
    pub units: Option<Vec<Unit>>,
    pub unit_measures: Option<HashMap<Unit, f64>>,
    pub decimal: Option<String>,
    pub max_decimal_points: Option<u32>,
}

impl HumanizerOptions {
    pub fn merged(&self, overrides: &HumanizerOverrides) -> HumanizerOptions {
        let mut options = self.clone();
        if let Some(language) = &overrides.language {
            options.language = language.clone();
        }
        if let Some(delimiter) = &overrides.delimiter {
            options.delimiter = delimiter.clone();
        }
        if let Some(spacer) = &overrides.spacer {
            options.spacer = spacer.clone();
        }
        if let Some(conjunction) = &overrides.conjunction {
            options.conjunction = conjunction.clone();
        }
        if let Some(serial_comma) = overrides.serial_comma {
            options.serial_comma = serial_comma;
        }
        if let Some(round) = overrides.round {
            options.round = round;
        }
        if let Some(largest) = overrides.largest {
            options.largest = Some(largest);
        }
        if let Some(units) = &overrides.units {
            options.units = units.clone();
        }
        if let Some(measures) = &overrides.unit_measures {
            options.unit_measures.extend(measures.iter().map(|(u, m)| (*u, *m)));
        }
        if let Some(decimal) = &overrides.decimal {
            options.decimal = Some(decimal.clone());
        }
        if let Some(points) = overrides.max_decimal_points {
            options.max_decimal_points = Some(points);
        }
        options
    }
}

/// One unit of a decomposed duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Piece {
    pub unit: Unit,
    pub count: f64,
}

/// Decompose `ms` over the configured unit ladder.
///
/// Units without a positive measure are skipped. The last unit keeps the
/// fractional remainder.
pub fn pieces(ms: f64, options: &HumanizerOptions) -> Vec<Piece> {
    let ladder: Vec<(Unit, f64)> = options
        .units
        .iter()
        .filter_map(|unit| {
            options
                .unit_measures
                .get(unit)
                .copied()
                .filter(|measure| *measure > 0.0)
                .map(|measure| (*unit, measure))
        })
        .collect();

    let mut remaining = ms.abs();
    let last = ladder.len().saturating_sub(1);
    let mut pieces: Vec<Piece> = Vec::with_capacity(ladder.len());
    for (i, (unit, measure)) in ladder.iter().enumerate() {
        let count = if i == last {
            remaining / measure
        } else {
            (remaining / measure).floor()
        };
        remaining -= count * measure;
        pieces.push(Piece { unit: *unit, count });
    }

    let first_occupied = pieces.iter().position(|piece| piece.count != 0.0).unwrap_or(0);

    if options.round {
        for i in (0..pieces.len()).rev() {
            pieces[i].count = pieces[i].count.round();
            if i == 0 {
                break;
            }

            let ratio = ladder[i - 1].1 / ladder[i].1;
            let beyond_largest = options
                .largest
                .filter(|largest| *largest > 0)
                .map_or(false, |largest| {
                    (largest as isize - 1) < (i as isize - first_occupied as isize)
                });

            if pieces[i].count % ratio == 0.0 || beyond_largest {
                pieces[i - 1].count += pieces[i].count / ratio;
                pieces[i].count = 0.0;
            }
        }
    }

    pieces
}

#[derive(Debug, Clone, Default)]
pub struct Humanizer {
    options: HumanizerOptions,
    dictionaries: HashMap<String, UnitDictionary>,
}

impl Humanizer {
    pub fn new(options: HumanizerOptions) -> Self {
        Self {
            options,
            dictionaries: HashMap::new(),
        }
    }

    /// Register a dictionary that takes precedence over the built-in one.
    pub fn with_dictionary(mut self, language: impl Into<String>, dictionary: UnitDictionary) -> Self {
        self.dictionaries.insert(language.into(), dictionary);
        self
    }

    pub fn options(&self) -> &HumanizerOptions {
        &self.options
    }

    pub fn humanize(&self, ms: f64) -> String {
        self.render(ms, &self.options)
    }

    pub fn humanize_with(&self, ms: f64, overrides: &HumanizerOverrides) -> String {
        self.render(ms, &self.options.merged(overrides))
    }

    fn dictionary(&self, language: &str) -> &UnitDictionary {
        self.dictionaries
            .get(language)
            .unwrap_or_else(|| dictionary::builtin(language))
    }

    fn render(&self, ms: f64, options: &HumanizerOptions) -> String {
        let dictionary = self.dictionary(&options.language);
        let limit = options.largest.filter(|largest| *largest > 0);

        let mut rendered = Vec::new();
        for piece in pieces(ms, options) {
            if piece.count != 0.0 {
                rendered.push(render_piece(piece.count, piece.unit, dictionary, options));
            }
            if Some(rendered.len()) == limit {
                break;
            }
        }

        if rendered.is_empty() {
            let smallest = options
                .units
                .iter()
                .rev()
                .find(|unit| options.unit_measures.get(unit).map_or(false, |m| *m > 0.0))
                .copied()
                .unwrap_or(Unit::Millisecond);
            return render_piece(0.0, smallest, dictionary, options);
        }

        if options.conjunction.is_empty() || rendered.len() == 1 {
            return rendered.join(&options.delimiter);
        }
        if rendered.len() == 2 {
            return rendered.join(&options.conjunction);
        }

        let last = rendered.pop().unwrap_or_default();
        format!(
            "{}{}{}{}",
            rendered.join(&options.delimiter),
            if options.serial_comma { "," } else { "" },
            options.conjunction,
            last
        )
    }
}

fn render_piece(count: f64, unit: Unit, dictionary: &UnitDictionary, options: &HumanizerOptions) -> String {
    let decimal = options.decimal.as_deref().unwrap_or(&dictionary.decimal);
    let number = match options.max_decimal_points {
        Some(points) => {
            let factor = 10f64.powi(points as i32);
            ((count * factor).floor() / factor).to_string()
        }
        None => count.to_string(),
    };
    format!(
        "{}{}{}",
        number.replace('.', decimal),
        options.spacer,
        dictionary.word(unit, count)
    )
}
