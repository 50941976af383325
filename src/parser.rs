//! Parse schema DSL source into AST using PEST.

use crate::ast::{FieldDecl, Literal, PacketSection, Protocol, TypeSpec};
use crate::error::SchemaError;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct SchemaParser;

/// Parse source into unvalidated packet sections.
pub fn parse(source: &str) -> Result<Protocol, SchemaError> {
    let pairs = SchemaParser::parse(Rule::protocol, source)
        .map_err(|e| SchemaError::Syntax(e.to_string()))?;
    let pair = pairs.into_iter().next().ok_or_else(|| syntax("empty parse"))?;
    build_protocol(pair)
}

fn syntax(msg: impl Into<String>) -> SchemaError {
    SchemaError::Syntax(msg.into())
}

fn build_protocol(pair: Pair<Rule>) -> Result<Protocol, SchemaError> {
    let mut packets = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::packet_section {
            packets.push(build_packet(inner)?);
        }
    }
    Ok(Protocol { packets })
}

fn build_packet(pair: Pair<Rule>) -> Result<PacketSection, SchemaError> {
    let mut name = String::new();
    let mut fields = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::field => fields.push(build_field(inner)?),
            _ => {}
        }
    }
    Ok(PacketSection { name, fields })
}

fn build_field(pair: Pair<Rule>) -> Result<FieldDecl, SchemaError> {
    let mut decl = FieldDecl::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::field_name => decl.name = Some(inner.as_str().to_string()),
            Rule::type_spec => decl.type_spec = Some(build_type_spec(inner)?),
            Rule::literal => decl.default = Some(build_literal(inner)?),
            _ => {}
        }
    }
    Ok(decl)
}

fn build_type_spec(pair: Pair<Rule>) -> Result<TypeSpec, SchemaError> {
    let inner = pair.into_inner().next().ok_or_else(|| syntax("empty type_spec"))?;
    let rule = inner.as_rule();
    match rule {
        Rule::named_type => Ok(TypeSpec::named(inner.as_str().trim())),
        Rule::length_type => {
            let mut it = inner.into_inner();
            let ty = it.next().ok_or_else(|| syntax("length_of: missing type"))?;
            let target = it.next().ok_or_else(|| syntax("length_of: missing target"))?;
            Ok(TypeSpec::LengthOf(
                Box::new(build_type_spec(ty)?),
                target.as_str().to_string(),
            ))
        }
        Rule::array_type => {
            let mut it = inner.into_inner();
            let ty = it.next().ok_or_else(|| syntax("array: missing element type"))?;
            let n = it.next().ok_or_else(|| syntax("array: missing length"))?;
            Ok(TypeSpec::array(build_type_spec(ty)?, parse_number(&n)?))
        }
        Rule::list_type => {
            let ty = inner
                .into_inner()
                .next()
                .ok_or_else(|| syntax("list: missing element type"))?;
            Ok(TypeSpec::list(build_type_spec(ty)?))
        }
        Rule::bytes_type => {
            let n = inner
                .into_inner()
                .find(|p| p.as_rule() == Rule::number)
                .map(|p| parse_number(&p))
                .transpose()?;
            Ok(TypeSpec::bytes(n))
        }
        _ => Err(syntax(format!("unexpected type rule {:?}", rule))),
    }
}

fn parse_number(pair: &Pair<Rule>) -> Result<u64, SchemaError> {
    pair.as_str()
        .parse()
        .map_err(|_| syntax(format!("number out of range: {}", pair.as_str())))
}

fn build_literal(pair: Pair<Rule>) -> Result<Literal, SchemaError> {
    let inner = pair.into_inner().next().ok_or_else(|| syntax("empty literal"))?;
    match inner.as_rule() {
        Rule::hex_literal => Ok(Literal::Hex(inner.as_str()[2..].to_string())),
        Rule::int_literal => inner
            .as_str()
            .parse::<i128>()
            .map(Literal::Int)
            .map_err(|_| syntax(format!("integer out of range: {}", inner.as_str()))),
        Rule::list_literal => inner
            .into_inner()
            .map(build_literal)
            .collect::<Result<Vec<_>, _>>()
            .map(Literal::List),
        other => Err(syntax(format!("unexpected literal rule {:?}", other))),
    }
}
