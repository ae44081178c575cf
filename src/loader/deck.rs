//! Deck list loader (.dck format)
//!
//! A deck file is a list of `N Card Name` lines, optionally suffixed with
//! `|SET` (and an art index after a second pipe). Bracketed headers switch
//! sections: `[Main]` and `[Sideboard]` hold cards, `[metadata]` holds
//! `Key=Value` pairs of which only `Name` is kept. Lines starting with `#`
//! or `//` are comments.

use crate::{Result, RulesError};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till1};
use nom::character::complete::{char, digit1, space0, space1};
use nom::combinator::{all_consuming, map, map_res, opt, rest};
use nom::sequence::{delimited, preceded, separated_pair, terminated};
use nom::IResult;
use std::path::Path;

/// Deck loader for .dck files
pub struct DeckLoader;

impl DeckLoader {
    /// Read and parse a deck file
    pub async fn load_from_file(path: &Path) -> Result<DeckList> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content).map_err(|e| match e {
            RulesError::ParseError(msg) => RulesError::ParseError(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse a deck from its text content
    pub fn parse(content: &str) -> Result<DeckList> {
        let mut deck = DeckList::default();
        let mut section = Section::Main;

        for (number, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            let parsed = all_consuming(deck_line)(line)
                .map(|(_, parsed)| parsed)
                .map_err(|_| RulesError::ParseError(format!("line {}: cannot parse '{}'", number + 1, line)))?;

            match parsed {
                Line::Header(name) => section = Section::from_header(name),
                Line::Card(entry) => match section {
                    Section::Main => deck.main_deck.push(entry),
                    Section::Sideboard => deck.sideboard.push(entry),
                    Section::Metadata | Section::Other => {
                        return Err(RulesError::ParseError(format!(
                            "line {}: card '{}' outside a card section",
                            number + 1,
                            entry.card_name
                        )))
                    }
                },
                Line::Meta(key, value) => match section {
                    Section::Metadata if key.eq_ignore_ascii_case("name") => deck.name = Some(value.to_string()),
                    Section::Metadata | Section::Other => {}
                    Section::Main | Section::Sideboard => {
                        return Err(RulesError::ParseError(format!(
                            "line {}: expected 'N Card Name', found '{}'",
                            number + 1,
                            line
                        )))
                    }
                },
            }
        }

        if deck.main_deck.is_empty() {
            return Err(RulesError::InvalidDeckFormat("Empty deck".to_string()));
        }
        Ok(deck)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Main,
    Sideboard,
    Metadata,
    Other,
}

impl Section {
    fn from_header(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "main" => Section::Main,
            "sideboard" => Section::Sideboard,
            "metadata" => Section::Metadata,
            _ => Section::Other,
        }
    }
}

#[derive(Debug)]
enum Line<'a> {
    Header(&'a str),
    Card(DeckEntry),
    Meta(&'a str, &'a str),
}

fn deck_line(input: &str) -> IResult<&str, Line<'_>> {
    alt((
        map(header, Line::Header),
        map(card_entry, Line::Card),
        map(metadata, |(key, value)| Line::Meta(key.trim(), value.trim())),
    ))(input)
}

fn header(input: &str) -> IResult<&str, &str> {
    delimited(char('['), take_till1(|c| c == ']'), char(']'))(input)
}

/// `4 Lightning Bolt`, `4x Lightning Bolt` or `4 Lightning Bolt|M10|1`
fn card_entry(input: &str) -> IResult<&str, DeckEntry> {
    let (input, count) = terminated(map_res(digit1, str::parse::<u8>), opt(tag("x")))(input)?;
    let (input, _) = space1(input)?;
    let (input, name) = map_res(take_till1(|c| c == '|'), |name: &str| {
        let name = name.trim();
        if name.is_empty() {
            Err("missing card name")
        } else {
            Ok(name)
        }
    })(input)?;
    let (input, set) = opt(preceded(char('|'), take_till1(|c| c == '|')))(input)?;
    let (input, _) = opt(preceded(char('|'), rest))(input)?;
    let (input, _) = space0(input)?;
    Ok((
        input,
        DeckEntry {
            card_name: name.to_string(),
            count,
            set: set.map(|s| s.trim().to_string()),
        },
    ))
}

fn metadata(input: &str) -> IResult<&str, (&str, &str)> {
    separated_pair(take_till1(|c| c == '='), char('='), rest)(input)
}

/// Represents a deck entry (card name and count)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckEntry {
    pub card_name: String,
    pub count: u8,
    pub set: Option<String>,
}

/// Represents a complete deck list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeckList {
    pub name: Option<String>,
    pub main_deck: Vec<DeckEntry>,
    pub sideboard: Vec<DeckEntry>,
}

impl DeckList {
    /// Total cards in main deck
    pub fn total_cards(&self) -> usize {
        self.main_deck.iter().map(|e| e.count as usize).sum()
    }

    /// Total cards in sideboard
    pub fn sideboard_size(&self) -> usize {
        self.sideboard.iter().map(|e| e.count as usize).sum()
    }

    /// Main-deck card names, one per copy
    pub fn card_names(&self) -> impl Iterator<Item = &str> {
        self.main_deck
            .iter()
            .flat_map(|e| std::iter::repeat(e.card_name.as_str()).take(e.count as usize))
    }
}
