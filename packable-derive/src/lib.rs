use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

/// Derives `Packable` for a named-field struct by packing/unpacking each
/// field, in declaration order, through its own `Packable` impl.
#[proc_macro_derive(Packable)]
pub fn derive_packable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return syn::Error::new_spanned(
                    &input.ident,
                    "Packable can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(
                &input.ident,
                "Packable can only be derived for structs",
            )
            .to_compile_error()
            .into();
        }
    };

    let field_idents: Vec<_> = fields.iter().map(|f| f.ident.clone().unwrap()).collect();

    let pack_body = field_idents.iter().map(|ident| {
        quote! { ::packable::Packable::pack(&self.#ident, w); }
    });

    let unpack_body = field_idents.iter().map(|ident| {
        quote! { let #ident = ::packable::Packable::unpack(r)?; }
    });

    let len_body = field_idents.iter().map(|ident| {
        quote! { ::packable::Packable::packed_len(&self.#ident) }
    });

    let expanded = quote! {
        impl ::packable::Packable for #name {
            fn pack(&self, w: &mut ::packable::Writer) {
                #(#pack_body)*
            }

            fn unpack(r: &mut ::packable::Reader) -> ::std::result::Result<Self, ::packable::PackError> {
                #(#unpack_body)*
                Ok(Self { #(#field_idents),* })
            }

            fn packed_len(&self) -> usize {
                0 #(+ #len_body)*
            }
        }
    };

    TokenStream::from(expanded)
}
