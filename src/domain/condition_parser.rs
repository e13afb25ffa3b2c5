//! Condition expression parser.
//!
//! Recursive descent over the infix grammar used by `buy_condition` and
//! `sell_condition`:
//!
//! ```text
//! or_expr    := and_expr (("or" | "||" | "|") and_expr)*
//! and_expr   := primary (("and" | "&&" | "&") primary)*
//! primary    := "(" or_expr ")" | comparison
//! comparison := operand ("<" | ">" | "<=" | ">=" | "==") operand
//! operand    := number | price_field | indicator_name
//! ```
//!
//! Keywords are case-insensitive; indicator names are not. Errors carry the
//! byte offset of the offending token.

use crate::domain::condition::{CompareOp, Condition, Operand, PriceField};
use crate::domain::error::ParseError;

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(ParseError {
                message: format!("expected '{}', found '{}'", expected, ch),
                position: self.pos,
            }),
            None => Err(ParseError {
                message: format!("expected '{}', found end of input", expected),
                position: self.pos,
            }),
        }
    }

    fn peek_word(&self) -> String {
        let mut word = String::new();
        for ch in self.remaining().chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
            } else {
                break;
            }
        }
        word
    }

    fn describe_next(&self) -> String {
        let word = self.peek_word();
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    /// Consume a word keyword (case-insensitive) or one of its symbol spellings.
    fn consume_connective(&mut self, keyword: &str, symbols: &[&str]) -> bool {
        self.skip_whitespace();
        let word = self.peek_word();
        if word.eq_ignore_ascii_case(keyword) {
            self.pos += word.len();
            return true;
        }
        for symbol in symbols {
            if self.remaining().starts_with(symbol) {
                self.pos += symbol.len();
                return true;
            }
        }
        false
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            return Ok(Operand::Constant(self.parse_number()?));
        }

        let word = self.peek_word();
        let starts_ident = word
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_');
        if !starts_ident {
            return Err(ParseError {
                message: format!("expected operand, found '{}'", self.describe_next()),
                position: self.pos,
            });
        }
        if word.eq_ignore_ascii_case("and") || word.eq_ignore_ascii_case("or") {
            return Err(ParseError {
                message: format!("expected operand, found keyword '{}'", word),
                position: self.pos,
            });
        }

        self.pos += word.len();
        Ok(match PriceField::from_name(&word) {
            Some(field) => Operand::Price(field),
            None => Operand::Indicator(word),
        })
    }

    fn parse_operator(&mut self) -> Result<CompareOp, ParseError> {
        self.skip_whitespace();
        let ops = [
            ("<=", CompareOp::Le),
            (">=", CompareOp::Ge),
            ("==", CompareOp::Eq),
            ("<", CompareOp::Lt),
            (">", CompareOp::Gt),
        ];
        for (symbol, op) in ops {
            if self.remaining().starts_with(symbol) {
                self.pos += symbol.len();
                return Ok(op);
            }
        }
        Err(ParseError {
            message: format!(
                "expected comparison operator (<, >, <=, >=, ==), found '{}'",
                self.describe_next()
            ),
            position: self.pos,
        })
    }

    fn parse_primary(&mut self) -> Result<Condition, ParseError> {
        self.skip_whitespace();
        if self.peek() == Some('(') {
            self.advance();
            let inner = self.parse_or()?;
            self.expect_char(')')?;
            return Ok(inner);
        }

        let left = self.parse_operand()?;
        let op = self.parse_operator()?;
        let right = self.parse_operand()?;
        Ok(Condition::Comparison { left, op, right })
    }

    fn parse_and(&mut self) -> Result<Condition, ParseError> {
        let mut terms = vec![self.parse_primary()?];
        while self.consume_connective("and", &["&&", "&"]) {
            terms.push(self.parse_primary()?);
        }
        Ok(fold(terms, Condition::And))
    }

    fn parse_or(&mut self) -> Result<Condition, ParseError> {
        let mut terms = vec![self.parse_and()?];
        while self.consume_connective("or", &["||", "|"]) {
            terms.push(self.parse_and()?);
        }
        Ok(fold(terms, Condition::Or))
    }

    fn parse(&mut self) -> Result<Condition, ParseError> {
        self.skip_whitespace();
        if self.remaining().is_empty() {
            return Err(ParseError {
                message: "empty condition".to_string(),
                position: self.pos,
            });
        }
        let condition = self.parse_or()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(ParseError {
                message: format!("unexpected input after condition: '{}'", self.remaining()),
                position: self.pos,
            });
        }
        Ok(condition)
    }
}

/// Collapse a single term, and splice same-kind children so that
/// `a and (b and c)` yields one flat `And`.
fn fold(terms: Vec<Condition>, make: fn(Vec<Condition>) -> Condition) -> Condition {
    if terms.len() == 1 {
        return terms.into_iter().next().unwrap_or(Condition::And(Vec::new()));
    }
    let joined = make(Vec::new());
    let mut flat = Vec::with_capacity(terms.len());
    for term in terms {
        match (&joined, term) {
            (Condition::And(_), Condition::And(inner)) | (Condition::Or(_), Condition::Or(inner)) => {
                flat.extend(inner)
            }
            (_, other) => flat.push(other),
        }
    }
    make(flat)
}

pub fn parse(input: &str) -> Result<Condition, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}
