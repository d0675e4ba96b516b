use proptest::prelude::*;
use x86emu::{
    operand::Operand,
    register::{Gpr, Register32, View},
    App, RegisterRef,
};

fn view() -> impl Strategy<Value = View> {
    prop_oneof![
        Just(View::Full),
        Just(View::Low16),
        Just(View::High8),
        Just(View::Low8),
    ]
}

fn view_mask(view: View) -> u32 {
    match view {
        View::Full => 0xffff_ffff,
        View::Low16 => 0x0000_ffff,
        View::High8 => 0x0000_ff00,
        View::Low8 => 0x0000_00ff,
    }
}

proptest! {
    #[test]
    fn sub_view_writes_only_touch_their_bits(initial in any::<u32>(), value in any::<u32>(), view in view()) {
        let mut reg = Register32::new(initial);
        reg.set(view, value);
        let mask = view_mask(view);
        prop_assert_eq!(reg.get32() & !mask, initial & !mask);
        let width_mask = view.width().mask() as u32;
        prop_assert_eq!(reg.get(view), value & width_mask);
    }

    #[test]
    fn named_registers_alias_the_full_register(initial in any::<u32>(), value in any::<u8>()) {
        let mut app = App::new();
        app.registers.ecx.set32(initial);
        let cl: RegisterRef = "cl".parse().unwrap();
        let ch: RegisterRef = "CH".parse().unwrap();
        app.registers.write(cl, u32::from(value));
        app.registers.write(ch, u32::from(value));
        prop_assert_eq!(
            app.registers.read(RegisterRef::new(Gpr::Ecx, View::Low16)),
            u32::from(value) * 0x101
        );
        prop_assert_eq!(app.registers.ecx.get32() >> 16, initial >> 16);
    }

    #[test]
    fn pops_return_pushes_in_reverse(values in prop::collection::vec(any::<u32>(), 1..64)) {
        let mut app = App::new();
        app.registers.set_esp(0x4000);
        app.registers.set_ebp(0x4000);
        for value in &values {
            app.push_u32(*value).unwrap();
        }
        prop_assert_eq!(app.registers.esp(), 0x4000 - 4 * values.len() as u32);
        let popped: Vec<u32> = (0..values.len()).map(|_| app.pop_u32().unwrap()).collect();
        let expected: Vec<u32> = values.iter().rev().copied().collect();
        prop_assert_eq!(popped, expected);
        prop_assert_eq!(app.registers.esp(), 0x4000);
    }

    #[test]
    fn indexed_operands_address_relative_to_the_base(base in 0x100u32..0x8000, offset in -0x80i32..0x80) {
        let mut app = App::new();
        app.registers.ebx.set32(base);
        let ebx: RegisterRef = "ebx".parse().unwrap();
        let operand = Operand::MemIndexed(ebx, offset);
        prop_assert_eq!(
            operand.resolve_address(&app).unwrap(),
            base.wrapping_add_signed(offset)
        );
    }
}
