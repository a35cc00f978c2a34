use std::collections::HashMap;

use crate::{
    error::FfireError,
    tokenizer::Token,
    types::{is_exported, Declaration, Field, Message, Primitive, Schema, StructDef, StructId, Type},
    utils::{error, quote, unsupported},
};

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref INTEGER: Regex = Regex::new(r"^\d+$").unwrap();
    static ref SEPARATOR: Regex = Regex::new(r"^(\n|;)$").unwrap();
    static ref EQUALS: Regex = Regex::new(r"^=$").unwrap();
    static ref STAR: Regex = Regex::new(r"^\*$").unwrap();
    static ref COMMA: Regex = Regex::new(r"^,$").unwrap();
    static ref DOT: Regex = Regex::new(r"^\.$").unwrap();
    static ref LEFT_BRACE: Regex = Regex::new(r"^\{$").unwrap();
    static ref RIGHT_BRACE: Regex = Regex::new(r"^\}$").unwrap();
    static ref LEFT_BRACKET: Regex = Regex::new(r"^\[$").unwrap();
    static ref RIGHT_BRACKET: Regex = Regex::new(r"^\]$").unwrap();
    static ref LEFT_PAREN: Regex = Regex::new(r"^\($").unwrap();
    static ref RIGHT_PAREN: Regex = Regex::new(r"^\)$").unwrap();
    static ref TAG: Regex = Regex::new(r"^`[^`]*`$").unwrap();
    static ref PACKAGE_KEYWORD: Regex = Regex::new(r"^package$").unwrap();
    static ref TYPE_KEYWORD: Regex = Regex::new(r"^type$").unwrap();
    static ref STRUCT_KEYWORD: Regex = Regex::new(r"^struct$").unwrap();
    static ref UNSUPPORTED_KEYWORD: Regex = Regex::new(r"^(map|interface|chan|func)$").unwrap();
    static ref END_OF_FILE: Regex = Regex::new(r"^$").unwrap();
}

/// A type expression before name resolution.
#[derive(Debug, Clone)]
enum TypeExpr {
    Named { name: String, line: usize, column: usize },
    Optional(Box<TypeExpr>),
    Array(Box<TypeExpr>),
}

#[derive(Debug)]
struct FieldExpr {
    name:      String,
    line:      usize,
    column:    usize,
    type_expr: TypeExpr,
    tag:       Option<String>,
}

#[derive(Debug)]
enum DeclBody {
    Struct(Vec<FieldExpr>),
    Alias(TypeExpr),
}

#[derive(Debug)]
struct DeclExpr {
    name:   String,
    line:   usize,
    column: usize,
    body:   DeclBody,
}

struct Parser<'a> {
    tokens: &'a [Token],
    index:  usize,
}

impl<'a> Parser<'a> {
    fn current(&self) -> &'a Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.index.min(last)]
    }

    fn peek(&self, test: &Regex) -> bool {
        test.is_match(&self.current().text)
    }

    fn eat(&mut self, test: &Regex) -> bool {
        if self.peek(test) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, test: &Regex, expected: &str) -> Result<&'a Token, FfireError> {
        let token = self.current();
        if !self.eat(test) {
            return Err(error(
                &format!("Expected {} but found {}", expected, quote(&token.text)),
                token.line,
                token.column,
            ));
        }
        Ok(token)
    }

    fn unexpected_token(&self) -> FfireError {
        let token = self.current();
        if token.text.is_empty() {
            error("Unexpected end of input", token.line, token.column)
        } else {
            error(&format!("Unexpected token {}", quote(&token.text)), token.line, token.column)
        }
    }

    fn skip_separators(&mut self) {
        while self.eat(&SEPARATOR) {}
    }

    /// A statement ends at a separator, or just before `)`, `}` or the end of input.
    fn end_statement(&mut self) -> Result<(), FfireError> {
        if self.eat(&SEPARATOR)
            || self.peek(&RIGHT_PAREN)
            || self.peek(&RIGHT_BRACE)
            || self.peek(&END_OF_FILE)
        {
            Ok(())
        } else {
            Err(self.unexpected_token())
        }
    }

    fn parse_file(&mut self) -> Result<(String, Vec<DeclExpr>), FfireError> {
        let mut package = String::new();
        let mut decls = Vec::new();

        self.skip_separators();
        if self.eat(&PACKAGE_KEYWORD) {
            package = self.expect(&IDENTIFIER, "package name")?.text.clone();
            self.end_statement()?;
        }

        loop {
            self.skip_separators();
            if self.eat(&END_OF_FILE) {
                break;
            }
            self.expect(&TYPE_KEYWORD, "\"type\"")?;

            if self.eat(&LEFT_PAREN) {
                loop {
                    self.skip_separators();
                    if self.eat(&RIGHT_PAREN) {
                        break;
                    }
                    decls.push(self.parse_type_spec()?);
                    self.end_statement()?;
                }
            } else {
                decls.push(self.parse_type_spec()?);
            }
            self.end_statement()?;
        }

        Ok((package, decls))
    }

    fn parse_type_spec(&mut self) -> Result<DeclExpr, FfireError> {
        let name = self.expect(&IDENTIFIER, "type name")?;
        self.eat(&EQUALS);

        let body = if self.eat(&STRUCT_KEYWORD) {
            DeclBody::Struct(self.parse_struct_body()?)
        } else {
            DeclBody::Alias(self.parse_type_expr()?)
        };

        Ok(DeclExpr {
            name: name.text.clone(),
            line: name.line,
            column: name.column,
            body,
        })
    }

    fn parse_struct_body(&mut self) -> Result<Vec<FieldExpr>, FfireError> {
        self.expect(&LEFT_BRACE, "\"{\"")?;
        let mut fields = Vec::new();

        loop {
            self.skip_separators();
            if self.eat(&RIGHT_BRACE) {
                return Ok(fields);
            }

            let first = self.current();
            if self.peek(&STAR) {
                return Err(unsupported("embedded fields are not supported", first.line, first.column));
            }
            self.expect(&IDENTIFIER, "field name")?;
            if self.peek(&SEPARATOR) || self.peek(&RIGHT_BRACE) || self.peek(&TAG) || self.peek(&DOT) {
                return Err(unsupported(
                    &format!("embedded field {} is not supported, give it a name", quote(&first.text)),
                    first.line,
                    first.column,
                ));
            }

            let mut names = vec![first];
            while self.eat(&COMMA) {
                names.push(self.expect(&IDENTIFIER, "field name")?);
            }

            let type_expr = self.parse_type_expr()?;
            let tag = if self.peek(&TAG) {
                let text = &self.current().text;
                self.index += 1;
                Some(text[1..text.len() - 1].to_owned())
            } else {
                None
            };
            self.end_statement()?;

            for name in names {
                fields.push(FieldExpr {
                    name:      name.text.clone(),
                    line:      name.line,
                    column:    name.column,
                    type_expr: type_expr.clone(),
                    tag:       tag.clone(),
                });
            }
        }
    }

    fn parse_type_expr(&mut self) -> Result<TypeExpr, FfireError> {
        let token = self.current();

        if self.eat(&STAR) {
            return Ok(TypeExpr::Optional(Box::new(self.parse_type_expr()?)));
        }

        if self.eat(&LEFT_BRACKET) {
            if self.eat(&RIGHT_BRACKET) {
                return Ok(TypeExpr::Array(Box::new(self.parse_type_expr()?)));
            }
            if self.peek(&INTEGER) || self.peek(&IDENTIFIER) {
                return Err(unsupported(
                    "fixed-size arrays are not supported, use a slice ([]T)",
                    token.line,
                    token.column,
                ));
            }
            return Err(self.unexpected_token());
        }

        if self.peek(&STRUCT_KEYWORD) {
            return Err(unsupported(
                "anonymous struct types are not supported, declare a named type",
                token.line,
                token.column,
            ));
        }

        if self.peek(&UNSUPPORTED_KEYWORD) {
            return Err(unsupported(
                &format!("{} types are not supported", token.text),
                token.line,
                token.column,
            ));
        }

        if self.eat(&IDENTIFIER) {
            if self.peek(&DOT) {
                return Err(unsupported(
                    &format!("qualified type name {}... is not supported", quote(&token.text)),
                    token.line,
                    token.column,
                ));
            }
            return Ok(TypeExpr::Named {
                name:   token.text.clone(),
                line:   token.line,
                column: token.column,
            });
        }

        Err(error(
            &format!("Expected type but found {}", quote(&token.text)),
            token.line,
            token.column,
        ))
    }
}

/// What a declaration name stands for once collected.
#[derive(Clone, Copy)]
enum Target<'a> {
    Struct(StructId),
    Alias(&'a TypeExpr),
}

/// Second pass: turns name references into concrete types and records which
/// declarations are referenced by other declarations.
struct Resolver<'a> {
    decls:      &'a [DeclExpr],
    index:      HashMap<&'a str, usize>,
    targets:    Vec<Target<'a>>,
    resolved:   Vec<Option<Type>>,
    stack:      Vec<usize>,
    referenced: Vec<bool>,
}

impl<'a> Resolver<'a> {
    fn resolve_decl(&mut self, at: usize) -> Result<Type, FfireError> {
        if let Some(resolved) = &self.resolved[at] {
            return Ok(resolved.clone());
        }

        let resolved = match self.targets[at] {
            Target::Struct(id) => Type::structure(id),
            Target::Alias(expr) => {
                if let Some(start) = self.stack.iter().position(|&open| open == at) {
                    let decls = self.decls;
                    let mut names: Vec<&str> = self.stack[start..]
                        .iter()
                        .map(|&open| decls[open].name.as_str())
                        .collect();
                    names.push(decls[at].name.as_str());
                    return Err(FfireError::CircularType(names.join(" -> ")));
                }
                self.stack.push(at);
                let resolved = self.resolve_expr(expr)?;
                self.stack.pop();
                resolved
            }
        };

        self.resolved[at] = Some(resolved.clone());
        Ok(resolved)
    }

    fn resolve_expr(&mut self, expr: &TypeExpr) -> Result<Type, FfireError> {
        match expr {
            TypeExpr::Named { name, line, column } => {
                if let Some(primitive) = Primitive::from_name(name) {
                    return Ok(Type::primitive(primitive));
                }
                match self.index.get(name.as_str()) {
                    Some(&target) => {
                        self.referenced[target] = true;
                        self.resolve_decl(target)
                    }
                    None => Err(FfireError::UndefinedType {
                        name:   name.clone(),
                        line:   *line,
                        column: *column,
                    }),
                }
            }
            TypeExpr::Optional(inner) => Ok(self.resolve_expr(inner)?.into_optional()),
            TypeExpr::Array(element) => Ok(Type::array(self.resolve_expr(element)?)),
        }
    }
}

fn resolve(package: String, decls: &[DeclExpr]) -> Result<Schema, FfireError> {
    let mut index = HashMap::new();
    let mut structs = Vec::new();
    let mut targets = Vec::with_capacity(decls.len());

    for (at, decl) in decls.iter().enumerate() {
        if Primitive::from_name(&decl.name).is_some() {
            return Err(error(
                &format!("The type name {} is reserved", quote(&decl.name)),
                decl.line,
                decl.column,
            ));
        }
        if index.insert(decl.name.as_str(), at).is_some() {
            return Err(error(
                &format!("The type {} is defined twice", quote(&decl.name)),
                decl.line,
                decl.column,
            ));
        }
        targets.push(match &decl.body {
            DeclBody::Struct(_) => {
                structs.push(StructDef {
                    name:   decl.name.clone(),
                    line:   decl.line,
                    column: decl.column,
                    fields: Vec::new(),
                });
                Target::Struct(StructId(structs.len() - 1))
            }
            DeclBody::Alias(expr) => Target::Alias(expr),
        });
    }

    let mut resolver = Resolver {
        decls,
        index,
        targets,
        resolved: vec![None; decls.len()],
        stack: Vec::new(),
        referenced: vec![false; decls.len()],
    };

    let mut declarations = Vec::with_capacity(decls.len());
    for (at, decl) in decls.iter().enumerate() {
        let type_ = resolver.resolve_decl(at)?;

        if let (DeclBody::Struct(fields), Target::Struct(id)) = (&decl.body, resolver.targets[at]) {
            for field in fields {
                let type_ = resolver.resolve_expr(&field.type_expr)?;
                structs[id.0].fields.push(Field {
                    name:   field.name.clone(),
                    line:   field.line,
                    column: field.column,
                    type_,
                    tag:    field.tag.clone(),
                });
            }
        }

        declarations.push(Declaration {
            name:   decl.name.clone(),
            line:   decl.line,
            column: decl.column,
            type_,
        });
    }

    let messages: Vec<Message> = declarations
        .iter()
        .zip(&resolver.referenced)
        .filter(|(decl, referenced)| is_exported(&decl.name) && !**referenced)
        .map(|(decl, _)| Message {
            name:  decl.name.clone(),
            type_: decl.type_.clone(),
        })
        .collect();

    if messages.is_empty() {
        return Err(FfireError::NoRootType);
    }

    debug!(
        "parsed package {:?}: {} declarations, {} structs, messages [{}]",
        package,
        declarations.len(),
        structs.len(),
        messages.iter().map(|m| m.name.as_str()).collect::<Vec<_>>().join(", ")
    );

    Ok(Schema {
        package,
        structs,
        declarations,
        messages,
    })
}

/// Parses tokens from [`tokenize_schema`](crate::tokenizer::tokenize_schema)
/// into a resolved `Schema` with its messages inferred.
pub fn parse_schema(tokens: &[Token]) -> Result<Schema, FfireError> {
    if tokens.is_empty() {
        return Err(error("Unexpected end of input", 1, 1));
    }
    let mut parser = Parser { tokens, index: 0 };
    let (package, decls) = parser.parse_file()?;
    resolve(package, &decls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize_schema;
    use crate::types::TypeKind;

    fn parse(text: &str) -> Result<Schema, FfireError> {
        parse_schema(&tokenize_schema(text)?)
    }

    #[test]
    fn parses_structs_and_aliases() {
        let schema = parse(
            "package fleet

            type Fleet struct {
                Name    string   `json:\"name\"`
                Devices []Device `json:\"devices\"`
                Owner   *string
            }

            type Device struct { ID int64; Tags []string }
            ",
        )
        .unwrap();

        assert_eq!(schema.package, "fleet");
        assert_eq!(schema.structs.len(), 2);
        assert_eq!(schema.messages.len(), 1);
        assert_eq!(schema.messages[0].name, "Fleet");

        let fleet = &schema.structs[0];
        assert_eq!(fleet.fields.len(), 3);
        assert_eq!(fleet.fields[0].tag.as_deref(), Some("json:\"name\""));
        assert_eq!(fleet.fields[1].type_, Type::array(Type::structure(StructId(1))));
        assert_eq!(fleet.fields[2].type_, Type::primitive(Primitive::String).into_optional());
        assert_eq!(fleet.fields[2].tag, None);
    }

    #[test]
    fn shares_struct_references() {
        let schema = parse(
            "package p
            type Line struct { A Point; B *Point }
            type Point struct { X int32 }",
        )
        .unwrap();
        let line = &schema.structs[0];
        assert_eq!(line.fields[0].type_.kind, TypeKind::Struct(StructId(1)));
        assert_eq!(line.fields[1].type_.kind, TypeKind::Struct(StructId(1)));
        assert!(line.fields[1].type_.optional);
        assert!(!line.fields[0].type_.optional);
    }

    #[test]
    fn grouped_declarations_and_multi_name_fields() {
        let schema = parse(
            "package p
            type (
                Pair struct { A, B int16 }
                Pairs = []Pair
            )",
        )
        .unwrap();
        assert_eq!(schema.structs[0].fields.len(), 2);
        assert_eq!(schema.structs[0].fields[1].name, "B");
        assert_eq!(schema.messages.len(), 1);
        assert_eq!(schema.messages[0].name, "Pairs");
    }

    #[test]
    fn message_inference_skips_unexported_and_referenced() {
        let schema = parse(
            "package p
            type internal struct { X int8 }
            type Counts []int32
            type Wrapper struct { C Counts }",
        )
        .unwrap();
        let names: Vec<&str> = schema.messages.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Wrapper"]);
    }

    #[test]
    fn resolves_aliases_through_optional() {
        let schema = parse(
            "package p
            type Label *string
            type Row struct { L Label; Values []Label }",
        )
        .unwrap();
        let row = &schema.structs[0];
        assert_eq!(row.fields[0].type_, Type::primitive(Primitive::String).into_optional());
        assert_eq!(
            row.fields[1].type_,
            Type::array(Type::primitive(Primitive::String).into_optional())
        );
    }

    #[test]
    fn undefined_type() {
        let err = parse("package p\ntype A struct {\n  B Missing\n}").unwrap_err();
        assert!(
            matches!(&err, FfireError::UndefinedType { name, line: 3, column: 5 } if name == "Missing"),
            "got {:?}",
            err
        );
    }

    #[test]
    fn no_root_type() {
        let err = parse("package p\ntype a struct { X int32 }").unwrap_err();
        assert!(matches!(err, FfireError::NoRootType));
    }

    #[test]
    fn unsupported_constructs() {
        for text in [
            "package p\ntype A struct { X [4]int32 }",
            "package p\ntype A struct { Inner }",
            "package p\ntype A struct { *Inner }",
            "package p\ntype A struct { X struct { Y int32 } }",
            "package p\ntype A struct { X map[string]int32 }",
        ] {
            let err = parse(text).unwrap_err();
            assert!(
                matches!(err, FfireError::UnsupportedConstruct { .. }),
                "{:?} gave {:?}",
                text,
                err
            );
        }
    }

    #[test]
    fn alias_cycle() {
        let err = parse("package p\ntype A []B\ntype B []A").unwrap_err();
        assert!(
            matches!(&err, FfireError::CircularType(path) if path == "A -> B -> A"),
            "got {:?}",
            err
        );
    }

    #[test]
    fn duplicate_and_reserved_names() {
        let err = parse("package p\ntype A int32\ntype A int64").unwrap_err();
        assert!(matches!(err, FfireError::Parse { line: 3, .. }));
        let err = parse("package p\ntype int32 struct { X bool }").unwrap_err();
        assert!(matches!(err, FfireError::Parse { .. }));
    }

    #[test]
    fn syntax_errors_carry_positions() {
        let err = parse("package p\ntype A struct {\n  X int32 int32\n}").unwrap_err();
        assert!(matches!(err, FfireError::Parse { line: 3, column: 11, .. }), "got {:?}", err);
        let err = parse("package p\ntype A struct {").unwrap_err();
        assert!(matches!(err, FfireError::Parse { .. }));
    }

    #[test]
    fn missing_package_is_left_empty() {
        let schema = parse("type Count int32").unwrap();
        assert_eq!(schema.package, "");
        assert_eq!(schema.messages[0].type_, Type::primitive(Primitive::Int32));
    }
}
