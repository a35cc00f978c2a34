use crate::{
    codegen::{ArrayStrategy, Backend, CodeWriter, GenContext, Language},
    error::FfireError,
    naming::{cpp_field_name, escape_cpp_keyword, to_pascal_case, to_snake_case},
    types::{Message, Primitive, StructId, Type, TypeKind},
};

/// Header-only C++17 backend.
pub struct CppBackend;

impl Backend for CppBackend {
    fn language(&self) -> Language {
        Language::Cpp
    }

    fn file_name(&self, package: &str) -> String {
        format!("{}.hpp", to_snake_case(package))
    }

    fn emit(&self, ctx: &GenContext<'_>) -> Result<String, FfireError> {
        let mut emitter = Emitter {
            ctx,
            w: CodeWriter::new("    "),
            next: 0,
        };
        emitter.header();
        for id in &ctx.structs {
            emitter.struct_def(*id);
        }
        emitter.w.line("namespace detail {");
        emitter.w.blank();
        for id in &ctx.structs {
            emitter.struct_codec(*id);
        }
        emitter.w.line("}  // namespace detail");
        emitter.w.blank();
        for message in &ctx.messages {
            emitter.message_fns(message);
        }
        emitter.footer();
        Ok(emitter.w.finish())
    }
}

/// Encoder/decoder runtime shared by every generated header.
const RUNTIME: &str = r#"namespace detail {

struct CapacityError : std::length_error {
    using std::length_error::length_error;
};

struct TruncatedError : std::out_of_range {
    using std::out_of_range::out_of_range;
};

inline bool little_endian() {
    const std::uint16_t probe = 1;
    std::uint8_t first = 0;
    std::memcpy(&first, &probe, 1);
    return first == 1;
}

class Encoder {
public:
    explicit Encoder(std::size_t capacity) { out_.reserve(capacity); }

    void write_bool(bool value) { out_.push_back(value ? 1 : 0); }

    template <typename T>
    void write_scalar(T value) {
        std::uint8_t raw[sizeof(T)];
        std::memcpy(raw, &value, sizeof(T));
        if (!little_endian()) {
            std::reverse(raw, raw + sizeof(T));
        }
        out_.insert(out_.end(), raw, raw + sizeof(T));
    }

    void write_len(std::size_t len) {
        if (len > 65535) {
            throw CapacityError("ffire: length " + std::to_string(len) + " exceeds 65535");
        }
        write_scalar<std::uint16_t>(static_cast<std::uint16_t>(len));
    }

    void write_string(const std::string& value) {
        write_len(value.size());
        out_.insert(out_.end(), value.begin(), value.end());
    }

    template <typename T>
    void write_bulk(const std::vector<T>& values) {
        write_len(values.size());
        if (little_endian()) {
            const auto* bytes = reinterpret_cast<const std::uint8_t*>(values.data());
            out_.insert(out_.end(), bytes, bytes + values.size() * sizeof(T));
        } else {
            for (T value : values) {
                write_scalar(value);
            }
        }
    }

    std::vector<std::uint8_t> finish() { return std::move(out_); }

private:
    std::vector<std::uint8_t> out_;
};

class Decoder {
public:
    Decoder(const std::uint8_t* data, std::size_t size) : data_(data), size_(size) {}

    std::size_t remaining() const { return size_ - pos_; }

    bool read_bool() {
        need(1);
        return data_[pos_++] != 0;
    }

    template <typename T>
    T read_scalar() {
        need(sizeof(T));
        std::uint8_t raw[sizeof(T)];
        std::memcpy(raw, data_ + pos_, sizeof(T));
        if (!little_endian()) {
            std::reverse(raw, raw + sizeof(T));
        }
        T value;
        std::memcpy(&value, raw, sizeof(T));
        pos_ += sizeof(T);
        return value;
    }

    std::size_t read_len() { return read_scalar<std::uint16_t>(); }

    std::string read_string() {
        std::size_t len = read_len();
        need(len);
        std::string value(reinterpret_cast<const char*>(data_ + pos_), len);
        pos_ += len;
        return value;
    }

    template <typename T>
    std::vector<T> read_bulk() {
        std::size_t len = read_len();
        need(len * sizeof(T));
        std::vector<T> values(len);
        if (little_endian()) {
            if (len > 0) {
                std::memcpy(values.data(), data_ + pos_, len * sizeof(T));
            }
            pos_ += len * sizeof(T);
        } else {
            for (auto& value : values) {
                value = read_scalar<T>();
            }
        }
        return values;
    }

private:
    void need(std::size_t len) {
        if (remaining() < len) {
            throw TruncatedError("ffire: truncated input at offset " + std::to_string(pos_));
        }
    }

    const std::uint8_t* data_;
    std::size_t size_;
    std::size_t pos_ = 0;
};

}  // namespace detail"#;

fn primitive_type(primitive: Primitive) -> &'static str {
    match primitive {
        Primitive::Bool => "bool",
        Primitive::Int8 => "std::int8_t",
        Primitive::Int16 => "std::int16_t",
        Primitive::Int32 => "std::int32_t",
        Primitive::Int64 => "std::int64_t",
        Primitive::Float32 => "float",
        Primitive::Float64 => "double",
        Primitive::String => "std::string",
    }
}

struct Emitter<'a, 'b> {
    ctx:  &'b GenContext<'a>,
    w:    CodeWriter,
    next: usize,
}

impl<'a, 'b> Emitter<'a, 'b> {
    fn fresh(&mut self, prefix: &str) -> String {
        let name = format!("{}{}", prefix, self.next);
        self.next += 1;
        name
    }

    fn guard(&self) -> String {
        format!("FFIRE_{}_HPP", to_snake_case(self.ctx.package()).to_ascii_uppercase())
    }

    fn namespace(&self) -> String {
        escape_cpp_keyword(&to_snake_case(self.ctx.package()))
    }

    fn struct_name(&self, id: StructId) -> String {
        escape_cpp_keyword(&to_pascal_case(&self.ctx.schema.struct_def(id).name))
    }

    fn cpp_type(&self, type_: &Type) -> String {
        let base = match &type_.kind {
            TypeKind::Primitive(primitive) => primitive_type(*primitive).to_string(),
            TypeKind::Struct(id) => self.struct_name(*id),
            TypeKind::Array(element) => format!("std::vector<{}>", self.cpp_type(element)),
        };
        if type_.optional {
            format!("std::optional<{}>", base)
        } else {
            base
        }
    }

    fn header(&mut self) {
        let guard = self.guard();
        self.w.line(format!("// Code generated by ffire from package {}. DO NOT EDIT.", self.ctx.package()));
        self.w.line(format!("#ifndef {}", guard));
        self.w.line(format!("#define {}", guard));
        self.w.blank();
        for include in ["algorithm", "cstddef", "cstdint", "cstring", "optional", "stdexcept", "string", "vector"] {
            self.w.line(format!("#include <{}>", include));
        }
        self.w.blank();
        self.w.line("static_assert(sizeof(float) == 4 && sizeof(double) == 8, \"ffire needs IEEE-754 floats\");");
        self.w.blank();
        self.w.line(format!("namespace {} {{", self.namespace()));
        self.w.blank();
        for line in RUNTIME.lines() {
            self.w.line(line);
        }
        self.w.blank();
    }

    fn footer(&mut self) {
        self.w.line(format!("}}  // namespace {}", self.namespace()));
        self.w.blank();
        self.w.line(format!("#endif  // {}", self.guard()));
    }

    fn struct_def(&mut self, id: StructId) {
        let ctx = self.ctx;
        let def = ctx.schema.struct_def(id);
        let info = *ctx.struct_info(id);

        self.w.open(format!("struct {} {{", self.struct_name(id)));
        if info.is_fixed_size {
            self.w.line(format!("static constexpr std::size_t encoded_size = {};", info.fixed_size));
            self.w.blank();
        }
        for field in &def.fields {
            self.w.line(format!("{} {}{{}};", self.cpp_type(&field.type_), cpp_field_name(&field.name)));
        }
        self.w.close("};");
        self.w.blank();
    }

    fn struct_codec(&mut self, id: StructId) {
        let ctx = self.ctx;
        let def = ctx.schema.struct_def(id);
        let name = self.struct_name(id);
        let info = *ctx.struct_info(id);

        self.next = 0;
        self.w.open(format!("inline std::size_t size_of(const {}& value) {{", name));
        if info.is_fixed_size {
            self.w.line(format!("return {}::encoded_size;", name));
        } else {
            let mut terms = Vec::new();
            let mut constant = 0;
            for field in &def.fields {
                let field_info = ctx.type_info(&field.type_);
                if field_info.is_fixed_size {
                    constant += field_info.fixed_size;
                } else {
                    terms.push(self.size_expr(&field.type_, &format!("value.{}", cpp_field_name(&field.name))));
                }
            }
            if constant > 0 || terms.is_empty() {
                terms.insert(0, constant.to_string());
            }
            self.w.line(format!("return {};", terms.join(" + ")));
        }
        self.w.close("}");
        self.w.blank();

        self.next = 0;
        self.w.open(format!("inline void encode(Encoder& e, const {}& value) {{", name));
        for field in &def.fields {
            self.encode(&field.type_, &format!("value.{}", cpp_field_name(&field.name)));
        }
        self.w.close("}");
        self.w.blank();

        self.next = 0;
        self.w.open(format!("inline void decode(Decoder& d, {}& out) {{", name));
        for field in &def.fields {
            self.decode(&field.type_, &format!("out.{}", cpp_field_name(&field.name)));
        }
        self.w.close("}");
        self.w.blank();
    }

    fn message_fns(&mut self, message: &Message) {
        let ctx = self.ctx;
        let fn_suffix = to_snake_case(&message.name);
        let type_name = escape_cpp_keyword(&to_pascal_case(&message.name));

        let names_struct = matches!(message.type_.kind, TypeKind::Struct(id)
            if !message.type_.optional && ctx.schema.struct_def(id).name == message.name);
        if !names_struct {
            self.w.line(format!("using {} = {};", type_name, self.cpp_type(&message.type_)));
            self.w.blank();
        }

        self.next = 0;
        self.w.open(format!(
            "inline std::vector<std::uint8_t> encode_{}(const {}& value) {{",
            fn_suffix, type_name
        ));
        let size = self.size_expr(&message.type_, "value");
        self.w.line(format!("detail::Encoder e({});", size));
        self.encode(&message.type_, "value");
        self.w.line("return e.finish();");
        self.w.close("}");
        self.w.blank();

        self.next = 0;
        self.w.open(format!(
            "inline {} decode_{}(const std::uint8_t* data, std::size_t size) {{",
            type_name, fn_suffix
        ));
        self.w.line("detail::Decoder d(data, size);");
        self.w.line(format!("{} value{{}};", type_name));
        self.decode(&message.type_, "value");
        self.w.line("return value;");
        self.w.close("}");
        self.w.blank();

        self.w.open(format!(
            "inline {} decode_{}(const std::vector<std::uint8_t>& data) {{",
            type_name, fn_suffix
        ));
        self.w.line(format!("return decode_{}(data.data(), data.size());", fn_suffix));
        self.w.close("}");
        self.w.blank();
    }

    fn size_expr(&mut self, type_: &Type, expr: &str) -> String {
        let info = self.ctx.type_info(type_);
        if info.is_fixed_size {
            return info.fixed_size.to_string();
        }

        if type_.optional {
            let inner = self.size_expr(&type_.required(), &format!("(*{})", expr));
            return format!("({} ? 1 + {} : 1)", expr, inner);
        }

        match &type_.kind {
            TypeKind::Primitive(_) => format!("(2 + {}.size())", expr),
            TypeKind::Struct(_) => format!("detail::size_of({})", expr),
            TypeKind::Array(element) => {
                let element_info = self.ctx.type_info(element);
                if element_info.is_fixed_size {
                    format!("(2 + {}.size() * {})", expr, element_info.fixed_size)
                } else {
                    let item = self.fresh("item");
                    let n = self.fresh("n");
                    let element_size = self.size_expr(element, &item);
                    format!(
                        "[&] {{ std::size_t {n} = 2; for (const auto& {item} : {expr}) {{ {n} += {size}; }} return {n}; }}()",
                        n = n,
                        item = item,
                        expr = expr,
                        size = element_size
                    )
                }
            }
        }
    }

    fn encode(&mut self, type_: &Type, expr: &str) {
        if type_.optional {
            self.w.open(format!("if ({}) {{", expr));
            self.w.line("e.write_bool(true);");
            self.encode(&type_.required(), &format!("(*{})", expr));
            self.w.dedent();
            self.w.line("} else {");
            self.w.indent();
            self.w.line("e.write_bool(false);");
            self.w.close("}");
            return;
        }

        match &type_.kind {
            TypeKind::Primitive(Primitive::Bool) => self.w.line(format!("e.write_bool({});", expr)),
            TypeKind::Primitive(Primitive::String) => self.w.line(format!("e.write_string({});", expr)),
            TypeKind::Primitive(primitive) => self.w.line(format!(
                "e.write_scalar<{}>({});",
                primitive_type(*primitive),
                expr
            )),
            TypeKind::Struct(_) => self.w.line(format!("detail::encode(e, {});", expr)),
            TypeKind::Array(element) => match self.ctx.array_strategy(element) {
                ArrayStrategy::Bulk(_) => self.w.line(format!("e.write_bulk({});", expr)),
                ArrayStrategy::ElementWise => {
                    let item = self.fresh("item");
                    self.w.line(format!("e.write_len({}.size());", expr));
                    self.w.open(format!("for (const auto& {} : {}) {{", item, expr));
                    self.encode(element, &item);
                    self.w.close("}");
                }
            },
        }
    }

    /// Decodes into the lvalue `target`.
    fn decode(&mut self, type_: &Type, target: &str) {
        if type_.optional {
            self.w.open("if (d.read_bool()) {");
            self.w.line(format!("{}.emplace();", target));
            self.decode(&type_.required(), &format!("(*{})", target));
            self.w.dedent();
            self.w.line("} else {");
            self.w.indent();
            self.w.line(format!("{}.reset();", target));
            self.w.close("}");
            return;
        }

        match &type_.kind {
            TypeKind::Primitive(Primitive::Bool) => self.w.line(format!("{} = d.read_bool();", target)),
            TypeKind::Primitive(Primitive::String) => self.w.line(format!("{} = d.read_string();", target)),
            TypeKind::Primitive(primitive) => self.w.line(format!(
                "{} = d.read_scalar<{}>();",
                target,
                primitive_type(*primitive)
            )),
            TypeKind::Struct(_) => self.w.line(format!("detail::decode(d, {});", target)),
            TypeKind::Array(element) => match self.ctx.array_strategy(element) {
                ArrayStrategy::Bulk(primitive) => self.w.line(format!(
                    "{} = d.read_bulk<{}>();",
                    target,
                    primitive_type(primitive)
                )),
                ArrayStrategy::ElementWise => {
                    let len = self.fresh("len");
                    let i = self.fresh("i");
                    self.w.open("{");
                    self.w.line(format!("std::size_t {} = d.read_len();", len));
                    self.w.line(format!("{}.clear();", target));
                    self.w.line(format!("{}.reserve(std::min({}, d.remaining()));", target, len));
                    self.w.open(format!("for (std::size_t {i} = 0; {i} < {len}; ++{i}) {{", i = i, len = len));
                    self.w.line(format!("{}.emplace_back();", target));
                    self.decode(element, &format!("{}.back()", target));
                    self.w.close("}");
                    self.w.close("}");
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codegen::{generate, generate_message, GenerateOptions},
        compiler::compile_schema,
    };

    const FLEET: &str = "package fleet
        type Fleet struct {
            Name    string   `json:\"name\"`
            Devices []Device `json:\"devices\"`
            Owner   *string
        }
        type Device struct {
            Id     int64
            Where  Point
            Levels []int16
            Flags  []bool
        }
        type Point struct { X, Y float32 }
        type Ids []int64";

    fn cpp(options: &GenerateOptions) -> String {
        let compiled = compile_schema(FLEET).unwrap();
        generate(&compiled.schema, &compiled.analysis, Language::Cpp, options)
            .unwrap()
            .source
    }

    #[test]
    fn header_layout() {
        let source = cpp(&GenerateOptions::default());
        assert!(source.starts_with("// Code generated by ffire from package fleet. DO NOT EDIT.\n#ifndef FFIRE_FLEET_HPP\n"));
        assert!(source.ends_with("}  // namespace fleet\n\n#endif  // FFIRE_FLEET_HPP\n"));
        assert!(source.contains("class Encoder {"));
        assert!(source.contains("throw TruncatedError("));

        // Dependencies come first.
        let point = source.find("struct Point {").unwrap();
        let device = source.find("struct Device {").unwrap();
        let fleet = source.find("struct Fleet {").unwrap();
        assert!(point < device && device < fleet);
    }

    #[test]
    fn fields_and_codecs() {
        let source = cpp(&GenerateOptions::default());
        assert!(source.contains(
            "struct Point {
    static constexpr std::size_t encoded_size = 8;

    float x{};
    float y{};
};"
        ));
        assert!(source.contains("    std::optional<std::string> owner{};"));
        assert!(source.contains("    std::vector<Device> devices{};"));

        assert!(source.contains("e.write_bulk(value.levels);"));
        assert!(source.contains("out.levels = d.read_bulk<std::int16_t>();"));
        assert!(source.contains("detail::encode(e, value.where);"));
        assert!(source.contains(
            "    if (value.owner) {\n        e.write_bool(true);\n        e.write_string((*value.owner));\n    } else {\n        e.write_bool(false);\n    }"
        ));
        assert!(source.contains("return 16 + (2 + value.flags.size() * 1) + (2 + value.levels.size() * 2);"));
        assert!(source.contains("using Ids = std::vector<std::int64_t>;"));
        assert!(source.contains("inline Fleet decode_fleet(const std::uint8_t* data, std::size_t size) {"));
    }

    #[test]
    fn element_wise_without_bulk() {
        let compiled = compile_schema(FLEET).unwrap();
        let options = GenerateOptions { bulk_arrays: false, ..GenerateOptions::default() };
        let source = generate_message(&compiled.schema, &compiled.analysis, Language::Cpp, "Ids", &options)
            .unwrap()
            .source;
        assert!(!source.contains("struct Fleet"));
        assert!(source.contains("e.write_len(value.size());"));
        assert!(source.contains("for (std::size_t i1 = 0; i1 < len0; ++i1) {"));
        assert!(source.contains("value.back() = d.read_scalar<std::int64_t>();"));
    }
}
