//! Parameter expansion.
//!
//! Each parameter value is a comma-separated list of parts. A part is a
//! range (`1:4`, `1..4`), an integer expression over earlier parameters
//! (`2n`, `n*n`, `n^2+1`), or a literal string. Parameters are expanded in
//! command-line order against every combination built so far, so later
//! parameters can depend on earlier ones.

use std::fmt;

/// One assignment of values to every parameter, in command-line order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Combination {
    values: Vec<(String, String)>,
}

impl Combination {
    /// Build a combination from ordered `(name, value)` pairs.
    #[must_use]
    pub fn from_pairs(values: Vec<(String, String)>) -> Self {
        Self { values }
    }

    /// Exact-name lookup.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Case-insensitive lookup used by expression variables.
    fn lookup(&self, ident: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(ident))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn with(&self, name: &str, value: String) -> Self {
        let mut values = self.values.clone();
        values.push((name.to_string(), value));
        Self { values }
    }
}

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// Expand `(NAME, value-spec)` pairs into the full cartesian product.
pub fn expand(params: &[(String, String)]) -> Result<Vec<Combination>, SweepError> {
    let mut combinations = vec![Combination::default()];

    for (name, spec) in params {
        let mut next = Vec::with_capacity(combinations.len());
        for combo in &combinations {
            for value in expand_value(name, spec, combo)? {
                next.push(combo.with(name, value));
            }
        }
        combinations = next;
    }

    Ok(combinations)
}

fn expand_value(name: &str, spec: &str, context: &Combination) -> Result<Vec<String>, SweepError> {
    let mut values = Vec::new();

    for part in spec.split(',').map(str::trim) {
        if let Some((start, end)) = split_range(part) {
            match (eval(start, context), eval(end, context)) {
                (Ok(start), Ok(end)) => {
                    if start >= end {
                        return Err(SweepError::EmptyRange {
                            param: name.to_string(),
                            part: part.to_string(),
                        });
                    }
                    values.extend((start..end).map(|i| i.to_string()));
                    continue;
                }
                (Err(e), _) | (_, Err(e)) if e.is_fatal() => {
                    return Err(SweepError::Arithmetic {
                        param: name.to_string(),
                        part: part.to_string(),
                        source: e,
                    });
                }
                _ => {}
            }
        }

        // A bare reference copies the earlier value verbatim, numeric or not.
        if is_identifier(part)
            && let Some(value) = context.lookup(part)
        {
            values.push(value.to_string());
            continue;
        }

        match eval(part, context) {
            Ok(v) => values.push(v.to_string()),
            Err(e) if e.is_fatal() => {
                return Err(SweepError::Arithmetic {
                    param: name.to_string(),
                    part: part.to_string(),
                    source: e,
                });
            }
            Err(_) => values.push(part.to_string()),
        }
    }

    Ok(values)
}

fn split_range(part: &str) -> Option<(&str, &str)> {
    if let Some((start, end)) = part.split_once("..") {
        return (!end.contains("..")).then_some((start, end));
    }
    let (start, end) = part.split_once(':')?;
    (!end.contains(':')).then_some((start, end))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Int(i64),
    Ident(String),
    Plus,
    Star,
    Caret,
    Open,
    Close,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let n = digits.parse().map_err(|_| ExprError::Syntax)?;
                tokens.push(Token::Int(n));
                // `2n` and `2(n+1)` multiply implicitly
                if i < chars.len()
                    && (chars[i].is_ascii_alphabetic() || chars[i] == '_' || chars[i] == '(')
                {
                    tokens.push(Token::Star);
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            _ => return Err(ExprError::Syntax),
        }
    }

    Ok(tokens)
}

/// Recursive-descent evaluator over the token stream.
struct Eval<'a> {
    tokens: Vec<Token>,
    pos: usize,
    context: &'a Combination,
}

impl Eval<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn sum(&mut self) -> Result<i64, ExprError> {
        let mut acc = self.product()?;
        while self.peek() == Some(&Token::Plus) {
            self.bump();
            acc = acc.checked_add(self.product()?).ok_or(ExprError::Overflow)?;
        }
        Ok(acc)
    }

    fn product(&mut self) -> Result<i64, ExprError> {
        let mut acc = self.power()?;
        while self.peek() == Some(&Token::Star) {
            self.bump();
            acc = acc.checked_mul(self.power()?).ok_or(ExprError::Overflow)?;
        }
        Ok(acc)
    }

    fn power(&mut self) -> Result<i64, ExprError> {
        let base = self.atom()?;
        if self.peek() != Some(&Token::Caret) {
            return Ok(base);
        }
        self.bump();
        let exp = self.power()?;
        let exp = u32::try_from(exp).map_err(|_| {
            if exp < 0 {
                ExprError::NegativeExponent
            } else {
                ExprError::Overflow
            }
        })?;
        base.checked_pow(exp).ok_or(ExprError::Overflow)
    }

    fn atom(&mut self) -> Result<i64, ExprError> {
        match self.bump() {
            Some(Token::Int(n)) => Ok(n),
            Some(Token::Ident(name)) => {
                let value = self
                    .context
                    .lookup(&name)
                    .ok_or_else(|| ExprError::UnknownVariable(name.clone()))?;
                value
                    .trim()
                    .parse()
                    .map_err(|_| ExprError::NotNumeric(name))
            }
            Some(Token::Open) => {
                let v = self.sum()?;
                match self.bump() {
                    Some(Token::Close) => Ok(v),
                    _ => Err(ExprError::Syntax),
                }
            }
            _ => Err(ExprError::Syntax),
        }
    }
}

fn eval(expr: &str, context: &Combination) -> Result<i64, ExprError> {
    let tokens = tokenize(expr.trim())?;
    if tokens.is_empty() {
        return Err(ExprError::Syntax);
    }
    let mut parser = Eval {
        tokens,
        pos: 0,
        context,
    };
    let value = parser.sum()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError::Syntax);
    }
    Ok(value)
}

/// Why a part could not be evaluated as an integer expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    #[error("not an integer expression")]
    Syntax,
    #[error("unknown variable {0}")]
    UnknownVariable(String),
    #[error("variable {0} is not a number")]
    NotNumeric(String),
    #[error("integer overflow")]
    Overflow,
    #[error("negative exponent")]
    NegativeExponent,
}

impl ExprError {
    /// Fatal errors abort the sweep; the rest make the part a literal.
    fn is_fatal(&self) -> bool {
        matches!(self, Self::Overflow | Self::NegativeExponent)
    }
}

/// Errors that can occur while expanding parameters.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("parameter {param}: cannot evaluate {part:?}: {source}")]
    Arithmetic {
        param: String,
        part: String,
        source: ExprError,
    },
    #[error("parameter {param}: range {part:?} is empty")]
    EmptyRange { param: String, part: String },
}
