use std::io::Read;

use serde::Deserialize;

use super::{split_member_ref, CallKind, ClassKind, FieldId, MethodId, Program, ProgramBuilder};
use crate::error::ProgramError;

/// Textual description of a program. Classes, methods and fields are named;
/// local variables are introduced by their first use inside a method body.
///
/// ```json
/// {
///   "entry": "Main.main()",
///   "classes": [
///     { "name": "A", "fields": [{ "name": "f" }],
///       "methods": [{ "signature": "m()", "body": [{ "return": { "var": "this" } }] }] },
///     { "name": "Main",
///       "methods": [{ "signature": "main()", "static": true, "body": [
///         { "new": { "lhs": "a", "class": "A" } },
///         { "invoke": { "kind": "virtual", "method": "A.m()", "receiver": "a", "result": "r" } }
///       ] }] }
///   ]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct ProgramDesc {
    pub entry: String,
    pub classes: Vec<ClassDesc>,
}

#[derive(Debug, Deserialize)]
pub struct ClassDesc {
    pub name: String,
    #[serde(default)]
    pub kind: ClassKind,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub superclass: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldDesc>,
    #[serde(default)]
    pub methods: Vec<MethodDesc>,
}

#[derive(Debug, Deserialize)]
pub struct FieldDesc {
    pub name: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

#[derive(Debug, Deserialize)]
pub struct MethodDesc {
    pub signature: String,
    #[serde(default, rename = "static")]
    pub is_static: bool,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub body: Vec<StmtDesc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StmtDesc {
    New {
        lhs: String,
        class: String,
    },
    Copy {
        lhs: String,
        rhs: String,
    },
    LoadField {
        lhs: String,
        base: String,
        field: String,
    },
    StoreField {
        base: String,
        field: String,
        rhs: String,
    },
    LoadStatic {
        lhs: String,
        field: String,
    },
    StoreStatic {
        field: String,
        rhs: String,
    },
    LoadArray {
        lhs: String,
        base: String,
    },
    StoreArray {
        base: String,
        rhs: String,
    },
    Invoke {
        kind: CallKind,
        method: String,
        #[serde(default)]
        receiver: Option<String>,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        result: Option<String>,
    },
    Return {
        #[serde(default)]
        var: Option<String>,
    },
}

impl Program {
    pub fn from_json(json: &str) -> Result<Self, ProgramError> {
        let desc: ProgramDesc = serde_json::from_str(json)?;
        desc.into_program()
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, ProgramError> {
        let desc: ProgramDesc = serde_json::from_reader(reader)?;
        desc.into_program()
    }
}

impl ProgramDesc {
    pub fn into_program(self) -> Result<Program, ProgramError> {
        let mut builder = ProgramBuilder::new();

        let class_ids = self
            .classes
            .iter()
            .map(|c| builder.add_class(&c.name, c.kind, None))
            .collect::<Result<Vec<_>, _>>()?;

        let lookup_class = |builder: &ProgramBuilder, name: &str| {
            builder
                .class_id(name)
                .ok_or_else(|| ProgramError::UnknownClass(name.to_owned()))
        };

        for (desc, &id) in self.classes.iter().zip(&class_ids) {
            builder.set_abstract(id, desc.is_abstract || desc.kind == ClassKind::Interface);
            if let Some(superclass) = &desc.superclass {
                let superclass = lookup_class(&builder, superclass)?;
                builder.set_superclass(id, Some(superclass));
            }
            for interface in &desc.interfaces {
                let interface = lookup_class(&builder, interface)?;
                builder.add_interface(id, interface);
            }
            for field in &desc.fields {
                builder.add_field(id, &field.name, field.is_static)?;
            }
        }

        let mut method_ids = Vec::new();
        for (desc, &id) in self.classes.iter().zip(&class_ids) {
            for method in &desc.methods {
                let params: Vec<&str> = method.params.iter().map(String::as_str).collect();
                let method_id = builder.add_method(
                    id,
                    &method.signature,
                    method.is_static,
                    method.is_abstract,
                    &params,
                )?;
                method_ids.push((method_id, &method.body));
            }
        }

        // Bodies go last, field references need every superclass linked.
        for (method, body) in method_ids {
            for stmt in body {
                add_stmt(&mut builder, method, stmt)?;
            }
        }

        let (class, subsignature) = split_member_ref(&self.entry)
            .ok_or_else(|| ProgramError::MalformedReference(self.entry.clone()))?;
        let class = lookup_class(&builder, class)?;
        let entry = builder
            .declared_method(class, subsignature)
            .ok_or_else(|| ProgramError::UnknownMethod(self.entry.clone()))?;
        builder.set_entry(entry);

        builder.build()
    }
}

fn resolve_field_ref(builder: &ProgramBuilder, field_ref: &str) -> Result<FieldId, ProgramError> {
    let (class, name) = split_member_ref(field_ref)
        .ok_or_else(|| ProgramError::MalformedReference(field_ref.to_owned()))?;
    let class = builder
        .class_id(class)
        .ok_or_else(|| ProgramError::UnknownClass(class.to_owned()))?;
    builder
        .resolve_field(class, name)
        .ok_or_else(|| ProgramError::UnknownField(field_ref.to_owned()))
}

fn add_stmt(
    builder: &mut ProgramBuilder,
    method: MethodId,
    stmt: &StmtDesc,
) -> Result<(), ProgramError> {
    match stmt {
        StmtDesc::New { lhs, class } => {
            let class = builder
                .class_id(class)
                .ok_or_else(|| ProgramError::UnknownClass(class.clone()))?;
            let lhs = builder.var(method, lhs);
            builder.push_new(method, lhs, class);
        }
        StmtDesc::Copy { lhs, rhs } => {
            let lhs = builder.var(method, lhs);
            let rhs = builder.var(method, rhs);
            builder.push_copy(method, lhs, rhs);
        }
        StmtDesc::LoadField { lhs, base, field } => {
            let field = resolve_field_ref(builder, field)?;
            let lhs = builder.var(method, lhs);
            let base = builder.var(method, base);
            builder.push_load_field(method, lhs, base, field);
        }
        StmtDesc::StoreField { base, field, rhs } => {
            let field = resolve_field_ref(builder, field)?;
            let base = builder.var(method, base);
            let rhs = builder.var(method, rhs);
            builder.push_store_field(method, base, field, rhs);
        }
        StmtDesc::LoadStatic { lhs, field } => {
            let field = resolve_field_ref(builder, field)?;
            let lhs = builder.var(method, lhs);
            builder.push_load_static(method, lhs, field);
        }
        StmtDesc::StoreStatic { field, rhs } => {
            let field = resolve_field_ref(builder, field)?;
            let rhs = builder.var(method, rhs);
            builder.push_store_static(method, field, rhs);
        }
        StmtDesc::LoadArray { lhs, base } => {
            let lhs = builder.var(method, lhs);
            let base = builder.var(method, base);
            builder.push_load_array(method, lhs, base);
        }
        StmtDesc::StoreArray { base, rhs } => {
            let base = builder.var(method, base);
            let rhs = builder.var(method, rhs);
            builder.push_store_array(method, base, rhs);
        }
        StmtDesc::Invoke {
            kind,
            method: method_ref,
            receiver,
            args,
            result,
        } => {
            let (class, subsignature) = split_member_ref(method_ref)
                .ok_or_else(|| ProgramError::MalformedReference(method_ref.clone()))?;
            let class = builder
                .class_id(class)
                .ok_or_else(|| ProgramError::UnknownClass(class.to_owned()))?;
            let receiver = receiver.as_ref().map(|r| builder.var(method, r));
            let args: Vec<_> = args.iter().map(|a| builder.var(method, a)).collect();
            let result = result.as_ref().map(|r| builder.var(method, r));
            builder.push_invoke(method, *kind, class, subsignature, receiver, &args, result);
        }
        StmtDesc::Return { var } => {
            let var = var.as_ref().map(|v| builder.var(method, v));
            builder.push_return(method, var);
        }
    }
    Ok(())
}
