//! Library sources and the libraries bundled with the assembler.

/// Where library source text comes from. Names are what `#include "..."`
/// refers to.
pub trait LibrarySource {
    fn get(&self, name: &str) -> Option<&str>;
    /// Names in the order they should be assembled.
    fn names(&self) -> Vec<String>;
    fn store(&mut self, name: &str, source: String);
}

/// In-memory library sources, kept in insertion order so that a library can
/// include any library stored before it.
#[derive(Debug, Clone, Default)]
pub struct LibraryStore {
    libs: Vec<(String, String)>,
}

impl LibraryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `fib.h` and `string.h`.
    pub fn with_defaults() -> Self {
        let mut store = Self::new();
        store.store("fib.h", FIB_H.to_string());
        store.store("string.h", STRING_H.to_string());
        store
    }
}

impl LibrarySource for LibraryStore {
    fn get(&self, name: &str) -> Option<&str> {
        self.libs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, source)| source.as_str())
    }

    fn names(&self) -> Vec<String> {
        self.libs.iter().map(|(name, _)| name.clone()).collect()
    }

    fn store(&mut self, name: &str, source: String) {
        match self.libs.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = source,
            None => self.libs.push((name.to_string(), source)),
        }
    }
}

pub const FIB_H: &str = r#"; fib.h
.text:

; push <n>
; call fib
; fib(n) is returned in ebx, n must be at least 1
@export fib:
    mov eax, [esp + 8]
    mov ebx, 0
    mov ecx, 1

fib_loop:
    mov edx, ebx
    add ebx, ecx
    mov ecx, edx
    dec eax
    jnz fib_loop

    ret
"#;

pub const STRING_H: &str = r#"; string.h
.text:

; push <string>
; push <result slot>
; call strlen
; the length replaces the result slot
@export strlen:
    mov eax, [esp + 12]
    mov ebx, 0

strlen_loop:
    mov cl, [eax]
    inc eax
    inc ebx
    cmp cl, 0
    jne strlen_loop

    dec ebx
    mov [esp + 8], ebx
    ret

; push <dest>
; push <src>
; call strcpy
@export strcpy:
    mov eax, [esp + 8]
    mov ebx, [esp + 12]

strcpy_loop:
    mov cl, [eax]
    mov [ebx], cl
    inc eax
    inc ebx
    cmp cl, 0
    jne strcpy_loop

    ret

; push <lhs>
; push <rhs>
; push <result slot>
; call strcmp
; the result slot becomes 1 when both strings are equal, 0 otherwise
@export strcmp:
    mov eax, [esp + 16]
    mov ebx, [esp + 12]

strcmp_loop:
    mov cl, [eax]
    mov dl, [ebx]
    cmp cl, dl
    jne strcmp_false
    cmp cl, 0
    jz strcmp_true
    inc eax
    inc ebx
    jmp strcmp_loop

strcmp_true:
    mov [esp + 8], 1
    ret

strcmp_false:
    mov [esp + 8], 0
    ret

; push <dest>
; push <suffix>
; call strcat
; dest needs room for both strings and the terminator
@export strcat:
    mov ebx, [esp + 8]
    mov eax, [esp + 12]

strcat_find_end:
    mov cl, [eax]
    cmp cl, 0
    je strcat_copy
    inc eax
    jmp strcat_find_end

strcat_copy:
    mov cl, [ebx]
    mov [eax], cl
    inc eax
    inc ebx
    cmp cl, 0
    jne strcat_copy

    ret

; push <dest>
; push <src>
; push <count>
; call strncat
; appends count bytes of src to dest and terminates it
@export strncat:
    mov eax, [esp + 16]

    push eax
    push 0
    call strlen
    pop eax
    pop ecx

    add eax, [esp + 16]
    mov ebx, [esp + 12]
    mov ecx, [esp + 8]

    push eax
    push eax
    push ebx
    push ecx
    call memcpy

    pop ecx
    pop ecx
    pop ecx
    pop eax

    add eax, [esp + 8]
    mov cl, 0
    mov [eax], cl
    ret

; push <dest>
; push <src>
; push <length>
; call memcpy
@export memcpy:
    mov eax, [esp + 8]
    mov ebx, [esp + 12]
    mov ecx, [esp + 16]

    cmp eax, 0
    je memcpy_end

memcpy_loop:
    mov dl, [ebx]
    mov [ecx], dl
    inc ecx
    inc ebx
    dec eax
    jnz memcpy_loop

memcpy_end:
    ret

; push <string>
; push <substring>
; push <result slot>
; call strstr
; the result slot gets the address of the first match, or 0
@export strstr:
    mov eax, [esp + 16]
    mov ebx, [esp + 12]
    mov edx, 0

strstr_loop:
    mov cl, [eax]
    mov ch, [ebx]
    cmp cl, 0
    je strstr_end
    cmp cl, ch
    je strstr_match
    inc eax
    jmp strstr_loop

strstr_match:
    push eax
    push ebx
    inc eax
    inc ebx

strstr_match_loop:
    mov cl, [eax]
    mov ch, [ebx]
    cmp ch, 0
    je strstr_found
    cmp cl, ch
    jne strstr_mismatch
    inc eax
    inc ebx
    jmp strstr_match_loop

strstr_mismatch:
    pop ebx
    pop eax
    inc eax
    jmp strstr_loop

strstr_found:
    pop ebx
    pop edx

strstr_end:
    mov [esp + 8], edx
    ret

; push <string>
; push <char>
; push <result slot>
; call strrchr
; the result slot gets the address of the last match, or 0
@export strrchr:
    mov eax, [esp + 16]
    mov ebx, [esp + 12]
    mov edx, 0

strrchr_loop:
    mov cl, [eax]
    cmp cl, bl
    jne strrchr_next
    mov edx, eax

strrchr_next:
    cmp cl, 0
    je strrchr_end
    inc eax
    jmp strrchr_loop

strrchr_end:
    mov [esp + 8], edx
    ret

; push <string>
; push <char>
; push <result slot>
; call strchr
; the result slot gets the address of the first match, or 0
@export strchr:
    mov eax, [esp + 16]
    mov ebx, [esp + 12]

strchr_loop:
    mov cl, [eax]
    cmp cl, bl
    je strchr_found
    cmp cl, 0
    je strchr_missing
    inc eax
    jmp strchr_loop

strchr_found:
    mov [esp + 8], eax
    ret

strchr_missing:
    mov [esp + 8], 0
    ret
"#;
