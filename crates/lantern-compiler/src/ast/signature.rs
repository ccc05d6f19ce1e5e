//! Textual type signatures.
//!
//! Signatures are what declarations carry (`int`, `string?`,
//! `Collections.Dict<string, List<int>>`, `Func<int, bool>`). The type
//! resolver turns them into [`TypeDesc`](lantern_core::TypeDesc)s.

use std::fmt;

/// A parsed type signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeSignature {
    /// Possibly namespace-qualified name (`Collections.List`).
    pub name: String,
    /// Generic arguments.
    pub args: Vec<TypeSignature>,
    /// Trailing `?`.
    pub nullable: bool,
}

impl TypeSignature {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            nullable: false,
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeSignature>) -> Self {
        Self {
            name: name.into(),
            args,
            nullable: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Parse a signature from text.
    ///
    /// Malformed text yields a signature named after the whole text, which
    /// then fails to resolve with the text in the error message.
    pub fn parse(text: &str) -> Self {
        let mut parser = Parser { text, pos: 0 };
        match parser.signature() {
            Some(sig) if parser.at_end() => sig,
            _ => TypeSignature::named(text.trim()),
        }
    }

    /// The name without its namespace qualifier.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// The namespace qualifier, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.name.rsplit_once('.').map(|(ns, _)| ns)
    }
}

impl From<&str> for TypeSignature {
    fn from(text: &str) -> Self {
        TypeSignature::parse(text)
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(">")?;
        }
        if self.nullable {
            f.write_str("?")?;
        }
        Ok(())
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn signature(&mut self) -> Option<TypeSignature> {
        let name = self.name()?;
        let mut sig = TypeSignature::named(name);
        if self.eat('<') {
            loop {
                sig.args.push(self.signature()?);
                if self.eat('>') {
                    break;
                }
                if !self.eat(',') {
                    return None;
                }
            }
        }
        sig.nullable = self.eat('?');
        Some(sig)
    }

    fn name(&mut self) -> Option<String> {
        self.skip_whitespace();
        let rest = &self.text[self.pos..];
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(rest.len());
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(rest[..len].to_string())
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.text[self.pos..].starts_with(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.text[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos == self.text.len()
    }
}
