use std::collections::BTreeMap;

use tracing::trace;

use super::FieldRequest;
use super::PvRequest;
use super::RequestBuilder;
use crate::RequestError;

/// Parser for the request-string grammar
///
/// ```text
/// request  := "" | list | section*
/// section  := "record[" options "]" | name "(" list? ")"     name: field, putField, getField
/// list     := entry ("," entry)*
/// entry    := path ("[" options "]")?                         path: segment ("." segment)*
/// options  := key "=" value ("," key "=" value)*
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct CreateRequest;

impl CreateRequest {
    pub fn new() -> Self {
        Self
    }
}

impl RequestBuilder for CreateRequest {
    fn build(
        &self,
        request: &str,
    ) -> std::result::Result<PvRequest, RequestError> {
        let result = Parser::new(request).parse();
        trace!(request, ?result, "createRequest");
        result
    }
}

type ParseResult<T> = std::result::Result<T, RequestError>;

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

fn is_ident(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn take_while(
        &mut self,
        accept: impl Fn(char) -> bool,
    ) -> &'a str {
        let src = self.src;
        let start = self.pos;
        while matches!(self.peek(), Some(c) if accept(c)) {
            self.bump();
        }
        &src[start..self.pos]
    }

    fn parse(mut self) -> ParseResult<PvRequest> {
        let mut request = PvRequest::default();
        let mut saw_record = false;
        let mut saw_section = false;

        loop {
            self.skip_ws();
            if self.peek().is_none() {
                return Ok(request);
            }
            let start = self.pos;
            let name = self.take_while(is_ident);

            match (name, self.peek()) {
                ("record", Some('[')) => {
                    if saw_record {
                        return Err(RequestError::DuplicateSection(name.to_string()));
                    }
                    let open = self.pos;
                    self.bump();
                    request.record_options = self.options(open)?;
                    saw_record = true;
                }
                (section, Some('(')) if !section.is_empty() => {
                    let open = self.pos;
                    self.bump();
                    let slot = match section {
                        "field" => &mut request.field,
                        "putField" => &mut request.put_field,
                        "getField" => &mut request.get_field,
                        other => return Err(RequestError::UnknownSection(other.to_string())),
                    };
                    if slot.is_some() {
                        return Err(RequestError::DuplicateSection(section.to_string()));
                    }
                    *slot = Some(self.field_list(Some(open))?);
                }
                _ if !saw_section => {
                    // Bare list: the whole request is the field selection
                    self.pos = start;
                    request.field = Some(self.field_list(None)?);
                    return Ok(request);
                }
                ("", Some(found)) => {
                    return Err(RequestError::IllegalCharacter {
                        found,
                        offset: self.pos,
                    });
                }
                (other, _) => return Err(RequestError::UnknownSection(other.to_string())),
            }
            saw_section = true;
        }
    }

    /// Parses entries up to the closing `)` of the section opened at `open`,
    /// or to end of input for a bare list.
    fn field_list(
        &mut self,
        open: Option<usize>,
    ) -> ParseResult<Vec<FieldRequest>> {
        let mut fields = Vec::new();

        self.skip_ws();
        if open.is_some() && self.peek() == Some(')') {
            self.bump();
            return Ok(fields);
        }

        loop {
            self.skip_ws();
            let start = self.pos;
            let path = self.take_while(|c| is_ident(c) || c == '.');

            if path.is_empty() {
                return Err(match (self.peek(), open) {
                    (None, Some(open)) => RequestError::Unbalanced { open: '(', offset: open },
                    (None, None) | (Some(',' | ')'), _) => RequestError::EmptyFieldName { offset: start },
                    (Some(found), _) => RequestError::IllegalCharacter {
                        found,
                        offset: self.pos,
                    },
                });
            }
            if path.split('.').any(str::is_empty) {
                return Err(RequestError::EmptyFieldName { offset: start });
            }

            self.skip_ws();
            let mut field = FieldRequest::new(path);
            if self.peek() == Some('[') {
                let bracket = self.pos;
                self.bump();
                field.options = self.options(bracket)?;
                self.skip_ws();
            }
            fields.push(field);

            match (self.peek(), open) {
                (Some(','), _) => {
                    self.bump();
                }
                (Some(')'), Some(_)) => {
                    self.bump();
                    return Ok(fields);
                }
                (None, None) => return Ok(fields),
                (None, Some(open)) => return Err(RequestError::Unbalanced { open: '(', offset: open }),
                (Some(found), _) => {
                    return Err(RequestError::IllegalCharacter {
                        found,
                        offset: self.pos,
                    })
                }
            }
        }
    }

    /// Parses `key=value` pairs up to the `]` matching the `[` at `open`
    fn options(
        &mut self,
        open: usize,
    ) -> ParseResult<BTreeMap<String, String>> {
        let start = self.pos;
        loop {
            match self.bump() {
                None => return Err(RequestError::Unbalanced { open: '[', offset: open }),
                Some(']') => break,
                Some('[') => {
                    return Err(RequestError::IllegalCharacter {
                        found: '[',
                        offset: self.pos - 1,
                    })
                }
                Some(_) => {}
            }
        }
        let body = &self.src[start..self.pos - 1];

        let mut options = BTreeMap::new();
        for entry in body.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    options.insert(key.trim().to_string(), value.trim().to_string());
                }
                _ => return Err(RequestError::MalformedOption(entry.to_string())),
            }
        }
        Ok(options)
    }
}
