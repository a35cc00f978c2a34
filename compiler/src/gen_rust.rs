use crate::{
    canonical::fixed_field_runs,
    codegen::{ArrayStrategy, Backend, CodeWriter, GenContext, Language},
    error::FfireError,
    naming::{escape_rust_keyword, rust_field_name, to_pascal_case, to_snake_case},
    types::{Field, Message, Primitive, StructId, Type, TypeKind},
};

/// Reference backend: plain structs plus encode/decode routines built on the
/// `ffire` runtime buffers.
pub struct RustBackend;

impl Backend for RustBackend {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn file_name(&self, package: &str) -> String {
        format!("{}.rs", to_snake_case(package))
    }

    fn emit(&self, ctx: &GenContext<'_>) -> Result<String, FfireError> {
        let mut emitter = Emitter {
            ctx,
            w: CodeWriter::new("    "),
            next: 0,
            uses_scalar: false,
        };

        for id in &ctx.structs {
            emitter.struct_def(*id);
        }
        for message in &ctx.messages {
            emitter.message_fns(message);
        }

        Ok(emitter.finish())
    }
}

fn primitive_type(primitive: Primitive) -> &'static str {
    match primitive {
        Primitive::Bool => "bool",
        Primitive::Int8 => "i8",
        Primitive::Int16 => "i16",
        Primitive::Int32 => "i32",
        Primitive::Int64 => "i64",
        Primitive::Float32 => "f32",
        Primitive::Float64 => "f64",
        Primitive::String => "String",
    }
}

/// Where a value lives in generated code: a field of `self`, or a variable
/// holding a reference.
struct Place {
    expr:   String,
    by_ref: bool,
}

impl Place {
    fn field(name: &str) -> Place {
        Place {
            expr:   format!("self.{}", name),
            by_ref: false,
        }
    }

    fn reference(name: &str) -> Place {
        Place {
            expr:   name.to_string(),
            by_ref: true,
        }
    }

    /// The value itself, for `Copy` types.
    fn value(&self) -> String {
        if self.by_ref {
            format!("*{}", self.expr)
        } else {
            self.expr.clone()
        }
    }

    fn as_ref(&self) -> String {
        if self.by_ref {
            self.expr.clone()
        } else {
            format!("&{}", self.expr)
        }
    }

    /// Method call receiver.
    fn recv(&self) -> &str {
        &self.expr
    }
}

struct Emitter<'a, 'b> {
    ctx:         &'b GenContext<'a>,
    w:           CodeWriter,
    next:        usize,
    uses_scalar: bool,
}

impl<'a, 'b> Emitter<'a, 'b> {
    fn fresh(&mut self, prefix: &str) -> String {
        let name = format!("{}{}", prefix, self.next);
        self.next += 1;
        name
    }

    fn struct_name(&self, id: StructId) -> String {
        escape_rust_keyword(&to_pascal_case(&self.ctx.schema.struct_def(id).name))
    }

    fn rust_type(&self, type_: &Type) -> String {
        let base = match &type_.kind {
            TypeKind::Primitive(primitive) => primitive_type(*primitive).to_string(),
            TypeKind::Struct(id) => self.struct_name(*id),
            TypeKind::Array(element) => format!("Vec<{}>", self.rust_type(element)),
        };
        if type_.optional {
            format!("Option<{}>", base)
        } else {
            base
        }
    }

    fn struct_def(&mut self, id: StructId) {
        let ctx = self.ctx;
        let def = ctx.schema.struct_def(id);
        let name = self.struct_name(id);
        let info = *ctx.struct_info(id);

        if ctx.options.serde {
            self.w.line("#[skip_serializing_none]");
            self.w.line("#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]");
        } else {
            self.w.line("#[derive(Debug, Clone, PartialEq, Default)]");
        }
        self.w.open(format!("pub struct {} {{", name));
        for field in &def.fields {
            let field_name = rust_field_name(&field.name);
            if ctx.options.serde && field.json_name() != field_name {
                self.w.line(format!("#[serde(rename = \"{}\")]", field.json_name()));
            }
            self.w.line(format!("pub {}: {},", field_name, self.rust_type(&field.type_)));
        }
        self.w.close("}");
        self.w.blank();

        self.w.line("#[allow(dead_code)]");
        self.w.open(format!("impl {} {{", name));
        if info.is_fixed_size {
            self.w.line("/// Encoded size in bytes.");
            self.w.line(format!("pub const ENCODED_SIZE: usize = {};", info.fixed_size));
            self.w.blank();
        }

        // encoded_len
        self.next = 0;
        self.w.open("pub(crate) fn encoded_len(&self) -> usize {");
        if info.is_fixed_size {
            self.w.line("Self::ENCODED_SIZE");
        } else {
            let mut constant = 0usize;
            let mut terms = Vec::new();
            for field in &def.fields {
                let field_info = ctx.type_info(&field.type_);
                if field_info.is_fixed_size {
                    constant += field_info.fixed_size;
                } else {
                    terms.push(self.size_expr(&field.type_, &Place::field(&rust_field_name(&field.name))));
                }
            }
            if constant > 0 || terms.is_empty() {
                terms.insert(0, constant.to_string());
            }
            if terms.len() > 1 {
                for term in terms.iter_mut().filter(|term| term.starts_with("if ")) {
                    *term = format!("({})", term);
                }
            }
            self.w.line(terms.join(" + "));
        }
        self.w.close("}");
        self.w.blank();

        // encode_into
        self.next = 0;
        self.w.open("pub(crate) fn encode_into(&self, bb: &mut ByteBufferMut) -> Result<(), WireError> {");
        for field in &def.fields {
            self.encode(&field.type_, &Place::field(&rust_field_name(&field.name)));
        }
        self.w.line("Ok(())");
        self.w.close("}");
        self.w.blank();

        // decode_from
        self.next = 0;
        self.w.open("pub(crate) fn decode_from(bb: &mut ByteBuffer<'_>) -> Result<Self, WireError> {");
        let runs = fixed_field_runs(ctx.schema, id);
        let mut index = 0;
        while index < def.fields.len() {
            match runs.iter().find(|run| run.start == index && run.len() > 1) {
                Some(run) => {
                    self.decode_run(&def.fields[run.clone()]);
                    index = run.end;
                }
                None => {
                    let field = &def.fields[index];
                    self.decode_let(&field.type_, &rust_field_name(&field.name));
                    index += 1;
                }
            }
        }
        let names: Vec<String> = def.fields.iter().map(|field| rust_field_name(&field.name)).collect();
        self.w.line(format!("Ok(Self {{ {} }})", names.join(", ")));
        self.w.close("}");

        // Messages named after this struct get methods too.
        if let Some(message) = ctx.messages.iter().find(|message| {
            message.name == def.name && message.type_ == Type::structure(id)
        }) {
            let fn_suffix = to_snake_case(&message.name);
            self.w.blank();
            self.w.open("pub fn encode(&self) -> Result<Vec<u8>, WireError> {");
            self.w.line(format!("encode_{}(self)", fn_suffix));
            self.w.close("}");
            self.w.blank();
            self.w.open("pub fn decode(data: &[u8]) -> Result<Self, WireError> {");
            self.w.line(format!("decode_{}(data)", fn_suffix));
            self.w.close("}");
        }

        self.w.close("}");
        self.w.blank();
    }

    /// One bounds check for a run of adjacent fixed primitive fields.
    fn decode_run(&mut self, fields: &[Field]) {
        let total: usize = fields
            .iter()
            .filter_map(|field| match field.type_.kind {
                TypeKind::Primitive(primitive) => primitive.fixed_size(),
                _ => None,
            })
            .sum();
        let run = self.fresh("run");
        self.w.line(format!("let {} = bb.read_bytes({})?;", run, total));

        let mut offset = 0;
        for field in fields {
            let TypeKind::Primitive(primitive) = field.type_.kind else {
                continue;
            };
            let size = primitive.fixed_size().unwrap_or(0);
            let name = rust_field_name(&field.name);
            if primitive == Primitive::Bool {
                self.w.line(format!("let {} = {}[{}] != 0;", name, run, offset));
            } else {
                self.uses_scalar = true;
                self.w.line(format!(
                    "let {} = {}::read_le(&{}[{}..{}]);",
                    name,
                    primitive_type(primitive),
                    run,
                    offset,
                    offset + size
                ));
            }
            offset += size;
        }
    }

    fn message_fns(&mut self, message: &Message) {
        let ctx = self.ctx;
        let fn_suffix = to_snake_case(&message.name);
        let type_name = escape_rust_keyword(&to_pascal_case(&message.name));

        let names_struct = matches!(message.type_.kind, TypeKind::Struct(id)
            if !message.type_.optional && ctx.schema.struct_def(id).name == message.name);
        if !names_struct {
            self.w.line(format!("pub type {} = {};", type_name, self.rust_type(&message.type_)));
            self.w.blank();
        }

        self.next = 0;
        let value = Place::reference("value");
        self.w.line(format!("/// Encodes a `{}` message.", message.name));
        self.w.open(format!(
            "pub fn encode_{}(value: &{}) -> Result<Vec<u8>, WireError> {{",
            fn_suffix, type_name
        ));
        let size = self.size_expr(&message.type_, &value);
        self.w.line(format!("let mut buffer = ByteBufferMut::with_capacity({});", size));
        self.w.line("let bb = &mut buffer;");
        self.encode(&message.type_, &value);
        self.w.line("Ok(buffer.data())");
        self.w.close("}");
        self.w.blank();

        self.next = 0;
        self.w.line(format!("/// Decodes a `{}` message.", message.name));
        self.w.open(format!(
            "pub fn decode_{}(data: &[u8]) -> Result<{}, WireError> {{",
            fn_suffix, type_name
        ));
        self.w.line("let mut buffer = ByteBuffer::new(data);");
        self.w.line("let bb = &mut buffer;");
        self.decode_let(&message.type_, "value");
        self.w.line("Ok(value)");
        self.w.close("}");
        self.w.blank();
    }

    fn size_expr(&mut self, type_: &Type, place: &Place) -> String {
        let info = self.ctx.type_info(type_);
        if info.is_fixed_size {
            return info.fixed_size.to_string();
        }

        if type_.optional {
            let inner = type_.required();
            let inner_info = self.ctx.type_info(&inner);
            if inner_info.is_fixed_size {
                return format!(
                    "if {}.is_some() {{ {} }} else {{ 1 }}",
                    place.recv(),
                    1 + inner_info.fixed_size
                );
            }
            let v = self.fresh("v");
            let inner_size = self.size_expr(&inner, &Place::reference(&v));
            return format!("1 + {}.as_ref().map_or(0, |{}| {})", place.recv(), v, inner_size);
        }

        match &type_.kind {
            TypeKind::Primitive(_) => format!("2 + {}.len()", place.recv()),
            TypeKind::Struct(_) => format!("{}.encoded_len()", place.recv()),
            TypeKind::Array(element) => {
                let element_info = self.ctx.type_info(element);
                if element_info.is_fixed_size {
                    format!("2 + {}.len() * {}", place.recv(), element_info.fixed_size)
                } else {
                    let v = self.fresh("v");
                    let element_size = self.size_expr(element, &Place::reference(&v));
                    format!(
                        "2 + {}.iter().map(|{}| {}).sum::<usize>()",
                        place.recv(),
                        v,
                        element_size
                    )
                }
            }
        }
    }

    fn encode(&mut self, type_: &Type, place: &Place) {
        if !type_.optional {
            self.encode_required(type_, place);
            return;
        }

        let v = self.fresh("v");
        self.w.open(format!("match {} {{", place.as_ref()));
        self.w.open(format!("Some({}) => {{", v));
        self.w.line("bb.write_presence(true);");
        self.encode_required(&type_.required(), &Place::reference(&v));
        self.w.close("}");
        self.w.line("None => bb.write_presence(false),");
        self.w.close("}");
    }

    fn encode_required(&mut self, type_: &Type, place: &Place) {
        match &type_.kind {
            TypeKind::Primitive(Primitive::String) => {
                self.w.line(format!("bb.write_string({})?;", place.as_ref()));
            }
            TypeKind::Primitive(Primitive::Bool) => {
                self.w.line(format!("bb.write_bool({});", place.value()));
            }
            TypeKind::Primitive(primitive) => {
                self.w.line(format!(
                    "bb.write_{}({});",
                    primitive_type(*primitive),
                    place.value()
                ));
            }
            TypeKind::Struct(_) => {
                self.w.line(format!("{}.encode_into(bb)?;", place.recv()));
            }
            TypeKind::Array(element) => match self.ctx.array_strategy(element) {
                ArrayStrategy::Bulk(_) => {
                    self.w.line(format!("bb.write_scalar_slice({}.as_slice())?;", place.recv()));
                }
                ArrayStrategy::ElementWise => {
                    let item = self.fresh("item");
                    self.w.line(format!("bb.write_array_len({}.len())?;", place.recv()));
                    self.w.open(format!("for {} in {}.iter() {{", item, place.recv()));
                    self.encode(element, &Place::reference(&item));
                    self.w.close("}");
                }
            },
        }
    }

    /// Writes `let name = ...;` decoding one value of `type_`.
    fn decode_let(&mut self, type_: &Type, name: &str) {
        if type_.optional {
            self.w.open(format!("let {} = if bb.read_presence()? {{", name));
            let inner = self.decode_expr(&type_.required());
            self.w.line(format!("Some({})", inner));
            self.w.dedent();
            self.w.line("} else {");
            self.w.indent();
            self.w.line("None");
            self.w.close("};");
            return;
        }

        if let TypeKind::Array(element) = &type_.kind {
            if self.ctx.array_strategy(element) == ArrayStrategy::ElementWise {
                let len = self.fresh("len");
                self.w.line(format!("let {} = bb.read_len()?;", len));
                self.w.line(format!(
                    "let mut {} = Vec::with_capacity({}.min(bb.remaining()));",
                    name, len
                ));
                self.w.open(format!("for _ in 0..{} {{", len));
                let item = self.decode_expr(element);
                self.w.line(format!("{}.push({});", name, item));
                self.w.close("}");
                return;
            }
        }

        let expr = self.decode_expr(type_);
        self.w.line(format!("let {} = {};", name, expr));
    }

    /// An expression evaluating to the decoded value. Values that need
    /// statements are bound to a temporary first.
    fn decode_expr(&mut self, type_: &Type) -> String {
        if type_.optional {
            let v = self.fresh("v");
            self.decode_let(type_, &v);
            return v;
        }

        match &type_.kind {
            TypeKind::Primitive(Primitive::String) => "bb.read_string()?".to_string(),
            TypeKind::Primitive(Primitive::Bool) => "bb.read_bool()?".to_string(),
            TypeKind::Primitive(primitive) => format!("bb.read_{}()?", primitive_type(*primitive)),
            TypeKind::Struct(id) => format!("{}::decode_from(bb)?", self.struct_name(*id)),
            TypeKind::Array(element) => match self.ctx.array_strategy(element) {
                ArrayStrategy::Bulk(primitive) => {
                    format!("bb.read_scalar_vec::<{}>()?", primitive_type(primitive))
                }
                ArrayStrategy::ElementWise => {
                    let items = self.fresh("items");
                    self.decode_let(type_, &items);
                    items
                }
            },
        }
    }

    fn finish(self) -> String {
        let ctx = self.ctx;
        let mut out = CodeWriter::new("    ");
        out.line(format!("// Code generated by ffire from package {}. DO NOT EDIT.", ctx.package()));
        out.blank();
        out.open(format!("pub mod {} {{", escape_rust_keyword(&to_snake_case(ctx.package()))));

        let mut imports = vec!["ByteBuffer", "ByteBufferMut"];
        if self.uses_scalar {
            imports.push("Scalar");
        }
        imports.push("WireError");
        out.line(format!("use {}::{{{}}};", ctx.options.runtime_crate, imports.join(", ")));
        if ctx.options.serde && !ctx.structs.is_empty() {
            out.line("use serde::{Deserialize, Serialize};");
            out.line("use serde_with::skip_serializing_none;");
        }
        out.blank();

        let body = self.w.finish();
        for line in body.lines() {
            out.line(line);
        }
        out.close("}");
        out.finish()
    }
}
